//! Members repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::member::{CreateMember, Member, MemberQuery, UpdateMember},
    repository::books::unique_violation,
};

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::MemberNotFound(format!("Member with id {} not found", id)))
    }

    /// Check that a member exists
    pub async fn exists(&self, id: Uuid) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Create a new member
    pub async fn create(&self, member: &CreateMember) -> AppResult<Member> {
        let now = Utc::now();

        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (id, name, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&member.name)
        .bind(&member.email)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                AppError::Conflict(format!("Member with email {} already exists", member.email))
            } else {
                e.into()
            }
        })
    }

    /// List members with search and pagination
    pub async fn list(&self, query: &MemberQuery) -> AppResult<(Vec<Member>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        let pattern = query.q.as_ref().map(|q| format!("%{}%", q));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM members WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT * FROM members
            WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((members, total))
    }

    /// Update an existing member
    pub async fn update(&self, id: Uuid, member: &UpdateMember) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members SET
                name = COALESCE($1, name),
                email = COALESCE($2, email),
                updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(member.name.as_deref())
        .bind(member.email.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                AppError::Conflict("Another member already uses this email".to_string())
            } else {
                AppError::from(e)
            }
        })?
        .ok_or_else(|| AppError::MemberNotFound(format!("Member with id {} not found", id)))
    }
}
