//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
///
/// Every failure kind the loan core can produce is a distinct variant so the
/// HTTP boundary can map it to the correct status code without inspecting
/// message strings.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(String),

    #[error("No copies available: {0}")]
    InventoryUnavailable(String),

    #[error("Loan limit exceeded: {0}")]
    LoanLimitExceeded(String),

    #[error("Loan already returned: {0}")]
    AlreadyReturned(String),

    #[error("Active loan already exists: {0}")]
    ActiveLoanExists(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Stale version conflict: {0}")]
    VersionConflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is transient storage contention that may succeed if
    /// the whole transaction is retried: a Postgres serialization failure
    /// (40001), a deadlock (40P01), or a stale optimistic-version conflict.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::VersionConflict(_) => true,
            AppError::Database(sqlx::Error::Database(e)) => {
                matches!(e.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::BookNotFound(msg) => (StatusCode::NOT_FOUND, "book_not_found", msg.clone()),
            AppError::MemberNotFound(msg) => {
                (StatusCode::NOT_FOUND, "member_not_found", msg.clone())
            }
            AppError::LoanNotFound(msg) => (StatusCode::NOT_FOUND, "loan_not_found", msg.clone()),
            AppError::InventoryUnavailable(msg) => {
                (StatusCode::CONFLICT, "inventory_unavailable", msg.clone())
            }
            AppError::LoanLimitExceeded(msg) => {
                (StatusCode::CONFLICT, "loan_limit_exceeded", msg.clone())
            }
            AppError::AlreadyReturned(msg) => {
                (StatusCode::CONFLICT, "already_returned", msg.clone())
            }
            AppError::ActiveLoanExists(msg) => {
                (StatusCode::CONFLICT, "active_loan_exists", msg.clone())
            }
            AppError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", msg.clone())
            }
            AppError::VersionConflict(msg) => {
                // Only reaches the boundary after the retry policy has given up.
                tracing::warn!("Version conflict surfaced after retries: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "transient_conflict",
                    "Temporary contention, please retry".to_string(),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Database(e) => {
                if self.is_transient() {
                    tracing::warn!("Transient database error surfaced after retries: {:?}", e);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "transient_conflict",
                        "Temporary contention, please retry".to_string(),
                    )
                } else {
                    tracing::error!("Database error: {:?}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "database_error",
                        "Database error".to_string(),
                    )
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_is_transient() {
        assert!(AppError::VersionConflict("book x".into()).is_transient());
    }

    #[test]
    fn business_errors_are_not_transient() {
        assert!(!AppError::AlreadyReturned("loan x".into()).is_transient());
        assert!(!AppError::InventoryUnavailable("book x".into()).is_transient());
        assert!(!AppError::LoanLimitExceeded("member x".into()).is_transient());
        assert!(!AppError::BookNotFound("book x".into()).is_transient());
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (AppError::BookNotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::MemberNotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::LoanNotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::InventoryUnavailable("x".into()),
                StatusCode::CONFLICT,
            ),
            (AppError::LoanLimitExceeded("x".into()), StatusCode::CONFLICT),
            (AppError::AlreadyReturned("x".into()), StatusCode::CONFLICT),
            (AppError::ActiveLoanExists("x".into()), StatusCode::CONFLICT),
            (
                AppError::RateLimited("x".into()),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::VersionConflict("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
