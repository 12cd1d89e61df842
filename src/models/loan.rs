//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Loan lifecycle status.
///
/// Two-state machine: `granted` is initial, `returned` is terminal, and the
/// transition is one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Granted,
    Returned,
}

/// Loan record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub granted_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

/// Create loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    pub book_id: Uuid,
    pub member_id: Uuid,
}

/// Query parameters for listing loans
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    /// Restrict to a single member
    pub member_id: Option<Uuid>,
    /// Only loans past their due date and not yet returned
    pub overdue: Option<bool>,
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page (max 100)
    pub per_page: Option<i64>,
    /// Sort field, prefix with `-` for descending (granted_at, due_at, returned_at)
    pub sort: Option<String>,
}
