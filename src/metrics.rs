//! Loan metrics registry
//!
//! Injectable (held behind an `Arc` in application state) so tests can
//! substitute a fresh registry. Recording is observational only and never
//! affects the outcome of the operation being measured.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Default)]
pub struct LoanMetrics {
    grant_success: AtomicU64,
    grant_failure: AtomicU64,
    active_loans: AtomicI64,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsSnapshot {
    pub grant_success_count: u64,
    pub grant_failure_count: u64,
    pub active_loans_gauge: i64,
}

impl LoanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_grant_success(&self) {
        self.grant_success.fetch_add(1, Ordering::Relaxed);
        self.active_loans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_grant_failure(&self) {
        self.grant_failure.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the active-loans gauge, floored at zero (returns recorded
    /// against a gauge that predates this process must not drive it negative).
    pub fn record_return(&self) {
        let _ = self
            .active_loans
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some((v - 1).max(0))
            });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            grant_success_count: self.grant_success.load(Ordering::Relaxed),
            grant_failure_count: self.grant_failure.load(Ordering::Relaxed),
            active_loans_gauge: self.active_loans.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_and_return_move_the_gauge() {
        let metrics = LoanMetrics::new();
        metrics.record_grant_success();
        metrics.record_grant_success();
        metrics.record_grant_failure();
        metrics.record_return();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.grant_success_count, 2);
        assert_eq!(snapshot.grant_failure_count, 1);
        assert_eq!(snapshot.active_loans_gauge, 1);
    }

    #[test]
    fn gauge_is_floored_at_zero() {
        let metrics = LoanMetrics::new();
        metrics.record_return();
        metrics.record_return();
        assert_eq!(metrics.snapshot().active_loans_gauge, 0);
    }
}
