// Retry with exponential backoff
//
// Works over any operation that communicates success/failure as a value:
// the last failure is returned as-is, no error is ever synthesized at the
// boundary. Pacing jitter lives in the ConcurrencyLimiter; this timer is
// deliberately jitter-free.

use crate::application::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff configuration: up to `max_retries + 1` total attempts, delay
/// between attempt n and n+1 is `min(base_delay_ms * 2^(n-1), max_delay_ms)`
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl RetryOptions {
    /// Delay before the attempt following the `attempt`-th failure (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Run `operation` with exponential backoff.
///
/// Stops early the first time a failure is classified non-retryable by
/// `is_retryable`, or when attempts are exhausted; either way the last
/// failure is returned unchanged.
pub async fn with_retry<T, E, F, Fut, P>(
    mut operation: F,
    options: &RetryOptions,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt > options.max_retries || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = options.delay_for(attempt);
                warn!(
                    attempt = %attempt,
                    max_retries = %options.max_retries,
                    delay_ms = %delay.as_millis(),
                    error = %err,
                    "Operation failed, scheduling retry"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_options(max_retries: u32) -> RetryOptions {
        RetryOptions {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            },
            &fast_options(3),
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {}", n))
            },
            &fast_options(2),
            |_| true,
        )
        .await;

        // max_retries=2 means exactly 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err(), "failure 3");
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permanent".to_string())
            },
            &fast_options(5),
            |_| false,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err(), "permanent");
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("transient".to_string())
                } else {
                    Ok("done")
                }
            },
            &fast_options(3),
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let options = RetryOptions {
            max_retries: 10,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        };
        assert_eq!(options.delay_for(1), Duration::from_millis(500));
        assert_eq!(options.delay_for(2), Duration::from_millis(1000));
        assert_eq!(options.delay_for(3), Duration::from_millis(2000));
        assert_eq!(options.delay_for(10), Duration::from_millis(30_000));
        // No overflow at absurd attempt counts
        assert_eq!(options.delay_for(200), Duration::from_millis(30_000));
    }
}
