//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{CreateLoanRequest, Loan, LoanQuery},
};

/// Paginated list of loans
#[derive(Serialize, ToSchema)]
pub struct LoanListResponse {
    pub items: Vec<Loan>,
    pub total: i64,
}

/// Grant a loan of a book to a member
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan granted", body = Loan),
        (status = 404, description = "Member or book not found"),
        (status = 409, description = "No copies available, loan limit reached, or duplicate active loan"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 503, description = "Persistent database contention")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .loans
        .grant_loan(request.book_id, request.member_id)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a granted loan
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan returned", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 503, description = "Persistent database contention")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.return_loan(loan_id).await?;
    Ok(Json(loan))
}

/// Get a single loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(loan_id).await?;
    Ok(Json(loan))
}

/// List loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans", body = LoanListResponse)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<LoanListResponse>> {
    let (items, total) = state.services.loans.list_loans(&query).await?;
    Ok(Json(LoanListResponse { items, total }))
}

/// List overdue loans
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Overdue loans", body = LoanListResponse)
    )
)]
pub async fn list_overdue_loans(
    State(state): State<crate::AppState>,
    Query(mut query): Query<LoanQuery>,
) -> AppResult<Json<LoanListResponse>> {
    query.overdue = Some(true);
    if query.sort.is_none() {
        query.sort = Some("-due_at".to_string());
    }
    let (items, total) = state.services.loans.list_loans(&query).await?;
    Ok(Json(LoanListResponse { items, total }))
}

/// Get loans for a specific member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "loans",
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member's loans", body = LoanListResponse),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member_loans(
    State(state): State<crate::AppState>,
    Path(member_id): Path<Uuid>,
) -> AppResult<Json<LoanListResponse>> {
    let (items, total) = state.services.loans.member_loans(member_id).await?;
    Ok(Json(LoanListResponse { items, total }))
}
