//! Uniform retry policy
//!
//! Every network-bound operation of a session (a source task attempt, a live
//! link check) runs through [`RetryPolicy::run`]: a bounded number of attempts,
//! each with its own timeout, separated by exponential backoff. Only errors
//! classified transient are retried.

use crate::config::RetryConfig;
use crate::source::SourceError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Attempt bound, backoff and per-attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

/// Final result of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, SourceError>,
    /// Attempts actually made (0 if cancelled before the first)
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            attempt_timeout: Duration::from_secs(config.task_timeout_secs),
        }
    }

    /// Delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`, capped
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use vespers::crawler::RetryPolicy;
    ///
    /// let policy = RetryPolicy {
    ///     max_attempts: 5,
    ///     base_delay: Duration::from_millis(500),
    ///     max_delay: Duration::from_secs(3),
    ///     attempt_timeout: Duration::from_secs(60),
    /// };
    /// assert_eq!(policy.backoff(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(3), Duration::from_secs(2));
    /// assert_eq!(policy.backoff(4), Duration::from_secs(3));
    /// ```
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Runs `operation` until it succeeds, fails terminally or exhausts the bound
    ///
    /// An attempt that exceeds `attempt_timeout` is dropped and counts as a
    /// transient [`SourceError::Timeout`]. Once `cancel` fires no further attempt
    /// starts; the last error is returned instead.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Session cancellation signal
    /// * `url` - URL reported on timeouts
    /// * `operation` - Produces one attempt's future
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, url: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() && attempts == 0 {
                return RetryOutcome {
                    result: Err(SourceError::Cancelled),
                    attempts,
                };
            }

            attempts += 1;
            let error = match tokio::time::timeout(self.attempt_timeout, operation()).await {
                Ok(Ok(value)) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                    }
                }
                Ok(Err(e)) => e,
                Err(_) => SourceError::Timeout {
                    url: url.to_string(),
                    after: self.attempt_timeout,
                },
            };

            if !error.is_transient() || attempts >= self.max_attempts || cancel.is_cancelled() {
                return RetryOutcome {
                    result: Err(error),
                    attempts,
                };
            }

            let delay = self.backoff(attempts);
            warn!(url, attempt = attempts, ?delay, error = %error, "Transient failure, retrying");

            tokio::select! {
                _ = cancel.cancelled() => {
                    return RetryOutcome { result: Err(error), attempts };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn transient() -> SourceError {
        SourceError::Transient {
            url: "https://example.org".to_string(),
            message: "HTTP 503".to_string(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy(10);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_secs(1));
        assert_eq!(policy.backoff(40), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_stops_at_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = calls.clone();
        let outcome: RetryOutcome<()> = policy(3)
            .run(&cancel, "https://example.org", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(outcome.result.unwrap_err().is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_not_retried() {
        let cancel = CancellationToken::new();
        let outcome: RetryOutcome<()> = policy(3)
            .run(&cancel, "https://example.org", || async {
                Err(SourceError::Http {
                    url: "https://example.org".to_string(),
                    status: 404,
                })
            })
            .await;

        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = calls.clone();
        let outcome = policy(3)
            .run(&cancel, "https://example.org", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient_and_bounded() {
        let cancel = CancellationToken::new();
        let outcome: RetryOutcome<()> = policy(2)
            .run(&cancel, "https://slow.example.org", || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert_eq!(outcome.attempts, 2);
        assert!(matches!(outcome.result, Err(SourceError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome: RetryOutcome<()> = policy(3)
            .run(&cancel, "https://example.org", || async { Ok(()) })
            .await;

        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.result.unwrap_err(), SourceError::Cancelled);
    }
}
