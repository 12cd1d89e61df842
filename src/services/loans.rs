//! Loan transaction service
//!
//! Grants and returns each run as a single database transaction. The book
//! row lock is the serialization point for availability; the loan row lock
//! serializes the return path. Lock ordering invariant: the grant path never
//! locks a loan row, and the return path always locks the loan before the
//! book, so no cross-operation lock cycle can form. Any new code path that
//! locks a loan must keep the loan-before-book order.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::{LoanConfig, RetryConfig},
    error::{AppError, AppResult},
    metrics::LoanMetrics,
    models::loan::{Loan, LoanQuery, LoanStatus},
    repository::Repository,
    retry::with_db_retry,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    loan_config: LoanConfig,
    retry_config: RetryConfig,
    metrics: Arc<LoanMetrics>,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        loan_config: LoanConfig,
        retry_config: RetryConfig,
        metrics: Arc<LoanMetrics>,
    ) -> Self {
        Self {
            repository,
            loan_config,
            retry_config,
            metrics,
        }
    }

    /// Grant a loan of a book to a member
    pub async fn grant_loan(&self, book_id: Uuid, member_id: Uuid) -> AppResult<Loan> {
        let result = with_db_retry(&self.retry_config, "grant_loan", || {
            self.try_grant(book_id, member_id)
        })
        .await;

        match &result {
            Ok(_) => self.metrics.record_grant_success(),
            Err(_) => self.metrics.record_grant_failure(),
        }
        result
    }

    async fn try_grant(&self, book_id: Uuid, member_id: Uuid) -> AppResult<Loan> {
        // Cheap unlocked rejection of the common abusive case before any lock.
        let active = self.repository.loans.count_active(member_id).await?;
        if active >= self.loan_config.max_active_loans as i64 {
            return Err(AppError::LoanLimitExceeded(format!(
                "Member {} has reached the maximum of {} active loans",
                member_id, self.loan_config.max_active_loans
            )));
        }

        if !self.repository.members.exists(member_id).await? {
            return Err(AppError::MemberNotFound(format!(
                "Member with id {} not found",
                member_id
            )));
        }

        // Best-effort early rejection; the partial unique index on active
        // loans is the authoritative guard if two grants race past this read.
        if self
            .repository
            .loans
            .find_active(book_id, member_id)
            .await?
            .is_some()
        {
            return Err(AppError::ActiveLoanExists(format!(
                "Member {} already has an active loan for book {}",
                member_id, book_id
            )));
        }

        let mut tx = self.repository.pool.begin().await?;

        let book = self
            .repository
            .books
            .get_with_lock(&mut tx, book_id)
            .await?
            .ok_or_else(|| AppError::BookNotFound(format!("Book with id {} not found", book_id)))?;

        // Availability must be read under the row lock; a pre-lock read would
        // be stale and admit over-booking.
        if book.available_copies < 1 {
            return Err(AppError::InventoryUnavailable(format!(
                "No copies of book {} available for loan",
                book_id
            )));
        }

        self.repository
            .books
            .decrement_available(&mut tx, &book)
            .await?;

        let granted_at = Utc::now();
        let due_at = granted_at + Duration::days(self.loan_config.loan_duration_days as i64);
        let loan = self
            .repository
            .loans
            .create(&mut tx, book_id, member_id, granted_at, due_at)
            .await?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Return a granted loan
    pub async fn return_loan(&self, loan_id: Uuid) -> AppResult<Loan> {
        let result = with_db_retry(&self.retry_config, "return_loan", || {
            self.try_return(loan_id)
        })
        .await;

        if result.is_ok() {
            self.metrics.record_return();
        }
        result
    }

    async fn try_return(&self, loan_id: Uuid) -> AppResult<Loan> {
        let mut tx = self.repository.pool.begin().await?;

        // Loan lock first, book lock second.
        let loan = self
            .repository
            .loans
            .get_with_lock(&mut tx, loan_id)
            .await?
            .ok_or_else(|| AppError::LoanNotFound(format!("Loan with id {} not found", loan_id)))?;

        if loan.status == LoanStatus::Returned {
            return Err(AppError::AlreadyReturned(format!(
                "Loan {} is already returned",
                loan_id
            )));
        }

        let returned_at = Utc::now();
        self.repository
            .loans
            .mark_returned(&mut tx, &loan, returned_at)
            .await?;

        // Should not dangle under referential integrity, but checked anyway.
        let book = self
            .repository
            .books
            .get_with_lock(&mut tx, loan.book_id)
            .await?
            .ok_or_else(|| {
                AppError::BookNotFound(format!(
                    "Book {} referenced by loan {} not found",
                    loan.book_id, loan_id
                ))
            })?;

        self.repository
            .books
            .increment_available(&mut tx, &book)
            .await?;

        tx.commit().await?;

        let mut returned = loan;
        returned.status = LoanStatus::Returned;
        returned.returned_at = Some(returned_at);
        Ok(returned)
    }

    /// Get a single loan
    pub async fn get_loan(&self, loan_id: Uuid) -> AppResult<Loan> {
        self.repository.loans.get_by_id(loan_id).await
    }

    /// List loans with filters and pagination
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<Loan>, i64)> {
        self.repository.loans.list(query).await
    }

    /// List a member's loans
    pub async fn member_loans(&self, member_id: Uuid) -> AppResult<(Vec<Loan>, i64)> {
        // Surface a 404 rather than an empty list for unknown members.
        self.repository.members.get_by_id(member_id).await?;
        let query = LoanQuery {
            member_id: Some(member_id),
            ..Default::default()
        };
        self.repository.loans.list(&query).await
    }
}
