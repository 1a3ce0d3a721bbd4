//! Consumer retry logic with linear backoff.
//!
//! Provides retry functionality for the Applier to absorb transient failures
//! before a message is routed to the Dead Letter Queue.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior.
///
/// Backoff is linear (`attempt * initial_backoff`), not exponential: the
/// pipeline's retry budget is small (5 attempts) and the point is to ride out
/// brief DB/log blips, not to shed load over minutes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Backoff applied before attempt N is `initial_backoff * N`.
    pub initial_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

/// Whether a failed operation should be retried.
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

/// Retry a fallible async operation with linear backoff.
///
/// Stops early if `operation` returns an error for which `is_retriable()` is
/// false — such an error is returned immediately without consuming further
/// attempts, since retrying would just reproduce it (e.g. a business failure
/// the Applier has already durably recorded).
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    context: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + Retriable,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(context = %context, attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_retriable() {
                    warn!(context = %context, attempt, error = %e, "non-retriable error, stopping");
                    return Err(e);
                }

                if attempt >= config.max_attempts {
                    warn!(
                        context = %context,
                        attempts = attempt,
                        error = %e,
                        "operation failed after max retries"
                    );
                    return Err(e);
                }

                let backoff = config.initial_backoff * attempt;
                warn!(
                    context = %context,
                    attempt,
                    max_attempts = config.max_attempts,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "operation failed, retrying with backoff"
                );

                sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    struct TestError {
        retriable: bool,
        msg: &'static str,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.msg)
        }
    }

    impl Retriable for TestError {
        fn is_retriable(&self) -> bool {
            self.retriable
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_first_attempt() {
        let result = retry_with_backoff(
            || async { Ok::<_, TestError>(42) },
            &fast_config(3),
            "test",
        )
        .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(
            || {
                let attempts = attempts_clone.clone();
                async move {
                    let mut count = attempts.lock().unwrap();
                    *count += 1;
                    if *count < 3 {
                        Err(TestError { retriable: true, msg: "transient" })
                    } else {
                        Ok(42)
                    }
                }
            },
            &fast_config(5),
            "test",
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retriable_error() {
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(
            || {
                let attempts = attempts_clone.clone();
                async move {
                    *attempts.lock().unwrap() += 1;
                    Err::<i32, _>(TestError { retriable: false, msg: "business failure" })
                }
            },
            &fast_config(5),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts_on_persistent_transient_error() {
        let attempts = Arc::new(Mutex::new(0));
        let attempts_clone = attempts.clone();

        let result = retry_with_backoff(
            || {
                let attempts = attempts_clone.clone();
                async move {
                    *attempts.lock().unwrap() += 1;
                    Err::<i32, _>(TestError { retriable: true, msg: "db down" })
                }
            },
            &fast_config(5),
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*attempts.lock().unwrap(), 5);
    }
}
