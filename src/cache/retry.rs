use crate::config::RetryConfig;
use crate::error::Result;
use crate::metrics::CACHE_WRITE_THROUGH_EVENTS_TOTAL;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Bounded exponential backoff for retryable store failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before retry number `retry` (0-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying store operation"
                    );
                    CACHE_WRITE_THROUGH_EVENTS_TOTAL
                        .with_label_values(&["retry"])
                        .inc();
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(50), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(0), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_retries_storage_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast_policy(3)
            .run("save", move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::Storage("connection reset".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast_policy(3)
            .run("save", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Storage("down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_conflict_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast_policy(5)
            .run("save", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Conflict {
                    id: "m1".to_string(),
                    expected: 0,
                    found: 1,
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
