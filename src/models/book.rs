//! Book (catalog inventory) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Book model from database
///
/// `available_copies` and `version` are mutated only by the loan transaction
/// service while holding the row lock; the version counter is an advisory
/// optimistic guard alongside the lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 512))]
    pub title: String,
    #[validate(length(min = 1, max = 256))]
    pub author: String,
    #[validate(length(min = 10, max = 17))]
    pub isbn: String,
    #[validate(range(min = 0))]
    #[serde(default = "default_total_copies")]
    pub total_copies: i32,
}

fn default_total_copies() -> i32 {
    1
}

/// Update book request (catalog fields only; copies are owned by the loan core)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 512))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub author: Option<String>,
}

/// Query parameters for listing books
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page (max 100)
    pub per_page: Option<i64>,
    /// Free text search over title, author and ISBN
    pub q: Option<String>,
    /// Sort field, prefix with `-` for descending (title, author, created_at)
    pub sort: Option<String>,
}
