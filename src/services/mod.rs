//! Business logic services

pub mod books;
pub mod loans;
pub mod members;

use std::sync::Arc;

use crate::{config::AppConfig, metrics::LoanMetrics, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, metrics: Arc<LoanMetrics>) -> Self {
        Self {
            books: books::BooksService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            loans: loans::LoansService::new(
                repository,
                config.loans.clone(),
                config.retry.clone(),
                metrics,
            ),
        }
    }
}
