//! Retry wrapper for transactional database operations
//!
//! Explicit function composition: the wrapped operation is passed in as a
//! closure producing a fresh future (and therefore a fresh transaction) per
//! attempt. A failed attempt's in-flight transaction rolls back when its
//! future is dropped.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::{config::RetryConfig, error::AppResult};

/// Run `op`, retrying on transient storage contention (serialization
/// failures, deadlocks, stale-version conflicts) with exponential backoff
/// and jitter.
///
/// Business-rule and not-found errors pass through untouched on the first
/// occurrence. After `max_retries` transient failures the transient error is
/// re-raised for the boundary to map to a server-unavailable response.
pub async fn with_db_retry<T, F, Fut>(config: &RetryConfig, op_name: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut retries: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if retries >= config.max_retries {
                    tracing::error!("Max retries reached for {}: {}", op_name, err);
                    return Err(err);
                }
                retries += 1;
                let delay = backoff_delay(config, retries);
                tracing::warn!(
                    "Transient database error in {}: {}. Retrying ({}/{}) in {:?}",
                    op_name,
                    err,
                    retries,
                    config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// `min(base * 2^(attempt-1), max)` plus uniform jitter up to 10% of the
/// capped delay.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = config.base_delay_ms.saturating_mul(1u64 << exponent);
    let capped = base.min(config.max_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 10);
    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::AppError;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_db_retry(&fast_config(), "test_op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::VersionConflict("book under contention".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn business_errors_pass_through_immediately() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_db_retry(&fast_config(), "test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::AlreadyReturned("loan".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::AlreadyReturned(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_reraise_the_transient_error() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_db_retry(&fast_config(), "test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::VersionConflict("book under contention".into())) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        // Initial attempt plus max_retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn backoff_is_capped_at_max_delay_plus_jitter() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        for attempt in 1..=10 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay >= Duration::from_millis(100.min(config.max_delay_ms)));
            assert!(delay <= Duration::from_millis(1100));
        }
        // First attempt stays near the base delay.
        let first = backoff_delay(&config, 1);
        assert!(first <= Duration::from_millis(110));
    }
}
