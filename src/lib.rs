//! Libris Library Lending Service
//!
//! A Rust REST JSON API server for a lending catalog: books, members and
//! loan records, built around a transactional loan core with retry and
//! admission control.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod retry;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub metrics: Arc<metrics::LoanMetrics>,
    pub rate_limiter: Arc<rate_limit::SlidingWindowRateLimiter>,
}
