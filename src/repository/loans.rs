//! Loans repository for database operations
//!
//! The unlocked reads (`find_active`, `count_active`) serve the coordinator's
//! cheap pre-checks and are not authoritative under race; the partial unique
//! index on active loans is. Transaction-scoped methods take the open
//! transaction and participate in its atomicity.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanQuery},
    repository::{books::unique_violation, parse_sort},
};

const LOAN_SORT_FIELDS: &[&str] = &["granted_at", "due_at", "returned_at"];

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID (unlocked read)
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::LoanNotFound(format!("Loan with id {} not found", id)))
    }

    /// Find the active loan of a book by a member, if any (unlocked read)
    pub async fn find_active(&self, book_id: Uuid, member_id: Uuid) -> AppResult<Option<Loan>> {
        sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE book_id = $1 AND member_id = $2 AND status = 'granted'",
        )
        .bind(book_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Count a member's active loans (unlocked read)
    pub async fn count_active(&self, member_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND status = 'granted'",
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Insert a new loan with status `granted`.
    ///
    /// A unique violation on the active-loan index means a concurrent grant
    /// won the race past the unlocked pre-check; surfaced as the same
    /// duplicate-loan conflict.
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_id: Uuid,
        member_id: Uuid,
        granted_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (id, book_id, member_id, granted_at, due_at, status)
            VALUES ($1, $2, $3, $4, $5, 'granted')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(member_id)
        .bind(granted_at)
        .bind(due_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                AppError::ActiveLoanExists(format!(
                    "Member {} already has an active loan for book {}",
                    member_id, book_id
                ))
            } else {
                e.into()
            }
        })
    }

    /// Lock the loan row for the duration of the enclosing transaction
    pub async fn get_with_lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<Option<Loan>> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Into::into)
    }

    /// Transition a loan from `granted` to `returned`, stamping `returned_at`.
    ///
    /// Caller must hold the row lock. The status guard in the WHERE clause
    /// makes the terminal transition irreversible even if a caller slips
    /// through without the lock.
    pub async fn mark_returned(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        loan: &Loan,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE loans SET status = 'returned', returned_at = $1 WHERE id = $2 AND status = 'granted'",
        )
        .bind(returned_at)
        .bind(loan.id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AlreadyReturned(format!(
                "Loan {} is already returned",
                loan.id
            )));
        }
        Ok(())
    }

    /// List loans with member/overdue filters, sort and pagination
    pub async fn list(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        let overdue = query.overdue.unwrap_or(false);

        let (sort_field, direction) =
            parse_sort(query.sort.as_deref(), LOAN_SORT_FIELDS, "-granted_at")?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loans
            WHERE ($1::uuid IS NULL OR member_id = $1)
              AND (NOT $2 OR (status = 'granted' AND due_at < NOW()))
            "#,
        )
        .bind(query.member_id)
        .bind(overdue)
        .fetch_one(&self.pool)
        .await?;

        let select_query = format!(
            r#"
            SELECT * FROM loans
            WHERE ($1::uuid IS NULL OR member_id = $1)
              AND (NOT $2 OR (status = 'granted' AND due_at < NOW()))
            ORDER BY {} {}, id
            LIMIT $3 OFFSET $4
            "#,
            sort_field, direction
        );

        let loans = sqlx::query_as::<_, Loan>(&select_query)
            .bind(query.member_id)
            .bind(overdue)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((loans, total))
    }

    /// Count loans past their due date and not yet returned
    pub async fn count_overdue(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE status = 'granted' AND due_at < NOW()",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
