//! Books repository for database operations
//!
//! Availability bookkeeping: `get_with_lock` / `decrement_available` /
//! `increment_available` are the only mutation path for `available_copies`
//! and run inside the caller's transaction. The book row lock is the
//! serialization point for concurrent grant/return on the same book; the
//! `version` column is an advisory optimistic guard on top of it.

use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::parse_sort,
};

const BOOK_SORT_FIELDS: &[&str] = &["title", "author", "created_at"];

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID (unlocked read)
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::BookNotFound(format!("Book with id {} not found", id)))
    }

    /// Lock the book row for the duration of the enclosing transaction.
    ///
    /// Blocks other lock acquirers on the same book until the transaction
    /// ends; availability checks and mutations must happen under this lock.
    pub async fn get_with_lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<Option<Book>> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Into::into)
    }

    /// Decrement available copies by one, bumping the version counter.
    ///
    /// Caller must hold the row lock and have verified `available_copies > 0`.
    /// Zero rows affected means the row changed under us despite the lock
    /// (stale version), surfaced as a transient conflict for the retry layer.
    pub async fn decrement_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book: &Book,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1,
                version = version + 1,
                updated_at = $1
            WHERE id = $2 AND version = $3
            "#,
        )
        .bind(Utc::now())
        .bind(book.id)
        .bind(book.version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::VersionConflict(format!("book {}", book.id)));
        }
        Ok(())
    }

    /// Increment available copies by one, bumping the version counter.
    ///
    /// Invoked once per matching grant; the `available_copies <= total_copies`
    /// check constraint backstops the invariant.
    pub async fn increment_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book: &Book,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1,
                version = version + 1,
                updated_at = $1
            WHERE id = $2 AND version = $3
            "#,
        )
        .bind(Utc::now())
        .bind(book.id)
        .bind(book.version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::VersionConflict(format!("book {}", book.id)));
        }
        Ok(())
    }

    /// Create a new book; all copies start available
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let now = Utc::now();

        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, isbn, total_copies, available_copies, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5, 1, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.total_copies)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                AppError::Conflict(format!("Book with ISBN {} already exists", book.isbn))
            } else {
                e.into()
            }
        })
    }

    /// List books with search, sort and pagination
    pub async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let (sort_field, direction) =
            parse_sort(query.sort.as_deref(), BOOK_SORT_FIELDS, "-created_at")?;
        let pattern = query.q.as_ref().map(|q| format!("%{}%", q));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let select_query = format!(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1)
            ORDER BY {} {}, id
            LIMIT $2 OFFSET $3
            "#,
            sort_field, direction
        );

        let books = sqlx::query_as::<_, Book>(&select_query)
            .bind(&pattern)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    /// Update catalog fields of an existing book
    pub async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($1, title),
                author = COALESCE($2, author),
                updated_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(book.title.as_deref())
        .bind(book.author.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::BookNotFound(format!("Book with id {} not found", id)))
    }

    /// Check if ISBN already exists
    pub async fn isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

/// Postgres unique constraint violation (SQLSTATE 23505)
pub(crate) fn unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
