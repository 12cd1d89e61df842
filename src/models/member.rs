//! Member model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Member model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create member request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

/// Update member request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Query parameters for listing members
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct MemberQuery {
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page (max 100)
    pub per_page: Option<i64>,
    /// Free text search over name and email
    pub q: Option<String>,
}
