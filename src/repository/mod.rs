//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod members;

use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub members: members::MembersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            members: members::MembersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Parse a `sort` query value (`field` or `-field`) against an allowlist,
/// returning the column name and SQL direction.
pub(crate) fn parse_sort<'a>(
    sort: Option<&'a str>,
    allowed: &[&'a str],
    default: &'a str,
) -> AppResult<(&'a str, &'static str)> {
    let raw = sort.unwrap_or(default);
    let (field, direction) = match raw.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (raw, "ASC"),
    };
    if !allowed.contains(&field) {
        return Err(AppError::Validation(format!(
            "Invalid sort field: {}. Allowed: {}",
            field,
            allowed.join(", ")
        )));
    }
    Ok((field, direction))
}

#[cfg(test)]
mod tests {
    use super::parse_sort;

    #[test]
    fn parse_sort_accepts_allowed_fields() {
        let (field, dir) = parse_sort(Some("title"), &["title", "created_at"], "-created_at")
            .expect("valid sort");
        assert_eq!((field, dir), ("title", "ASC"));

        let (field, dir) = parse_sort(Some("-title"), &["title", "created_at"], "-created_at")
            .expect("valid sort");
        assert_eq!((field, dir), ("title", "DESC"));
    }

    #[test]
    fn parse_sort_falls_back_to_default() {
        let (field, dir) =
            parse_sort(None, &["title", "created_at"], "-created_at").expect("valid sort");
        assert_eq!((field, dir), ("created_at", "DESC"));
    }

    #[test]
    fn parse_sort_rejects_unknown_fields() {
        assert!(parse_sort(Some("isbn; DROP TABLE"), &["title"], "title").is_err());
    }
}
