use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(300),
            timeout: Duration::from_millis(1500),
        }
    }
}

/// Execute a future with retry logic
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        debug!("Attempt {} of {}", attempt, config.max_attempts);

        match timeout(config.timeout, operation()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => {
                if !e.is_retryable() {
                    debug!("Error is not retryable: {}", e);
                    return Err(e);
                }
                if attempt < config.max_attempts {
                    warn!(
                        "Attempt {} failed, retrying in {:?}: {}",
                        attempt, config.delay, e
                    );
                }
                last_error = Some(e);
            }
            Err(_) => {
                if attempt < config.max_attempts {
                    warn!(
                        "Attempt {} timed out after {:?}, retrying",
                        attempt, config.timeout
                    );
                }
                last_error = Some(Error::timeout(config.timeout, format!("attempt-{attempt}")));
            }
        }

        // Don't sleep on the last attempt
        if attempt < config.max_attempts {
            sleep(config.delay).await;
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::InternalError("Retry failed with no error captured".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_success_on_second_attempt() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let config = RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(10),
            ..Default::default()
        };

        let result = with_retry(&config, || {
            let count = attempt_count_clone.clone();
            async move {
                let attempt = count.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    Err(Error::Transport("connection reset".to_string()))
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let config = RetryConfig {
            max_attempts: 3,
            ..Default::default()
        };

        let result: Result<&str> = with_retry(&config, || {
            let count = attempt_count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err(Error::SubmissionRejected("bad credentials".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1); // Should not retry
    }

    #[tokio::test]
    async fn test_retry_timeout() {
        let config = RetryConfig {
            max_attempts: 2,
            timeout: Duration::from_millis(50),
            delay: Duration::from_millis(10),
        };

        let result: Result<&str> = with_retry(&config, || async {
            sleep(Duration::from_millis(100)).await;
            Ok("should timeout")
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_fixed_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let attempt_times = Arc::new(std::sync::Mutex::new(Vec::new()));
        let times_clone = attempt_times.clone();

        let config = RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(20),
            timeout: Duration::from_secs(1),
        };

        let _: Result<()> = with_retry(&config, || {
            let times = times_clone.clone();
            async move {
                times.lock().unwrap().push(start.elapsed());
                Err(Error::Transport("down".to_string()))
            }
        })
        .await;

        let times = attempt_times.lock().unwrap();
        assert_eq!(times.len(), 3);
        for i in 1..times.len() {
            let gap = times[i] - times[i - 1];
            assert!(gap >= Duration::from_millis(20), "gap was {gap:?}");
        }
    }

    #[tokio::test]
    async fn test_no_sleep_on_last_attempt() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt_count.clone();

        let config = RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(10),
            ..Default::default()
        };

        let start = tokio::time::Instant::now();
        let _: Result<()> = with_retry(&config, || {
            let count = attempt_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transport("down".to_string()))
            }
        })
        .await;

        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
        // Two sleeps between three attempts, none trailing.
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let count_clone = attempt_count.clone();

        let config = RetryConfig {
            max_attempts: 5,
            ..Default::default()
        };

        let result = with_retry(&config, || {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok("immediate success")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "immediate success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_max_attempts() {
        let config = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };

        let result: Result<&str> = with_retry(&config, || async { Ok("test") }).await;

        assert!(result.is_err());
        assert!(matches!(
            result,
            Err(Error::InternalError(msg)) if msg.contains("Retry failed")
        ));
    }

    #[tokio::test]
    async fn test_alternating_errors() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let count_clone = attempt_count.clone();

        let config = RetryConfig {
            max_attempts: 5,
            delay: Duration::from_millis(10),
            ..Default::default()
        };

        let result = with_retry(&config, || {
            let count = count_clone.clone();
            async move {
                let attempt = count.fetch_add(1, Ordering::SeqCst);
                match attempt {
                    0 => Err(Error::Transport("reset".to_string())),
                    1 => Err(Error::Timeout {
                        duration: Duration::from_secs(1),
                        operation: "test".to_string(),
                    }),
                    _ => Ok("success after various errors"),
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success after various errors");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_operation_completes_just_before_timeout() {
        let config = RetryConfig {
            max_attempts: 1,
            timeout: Duration::from_millis(100),
            ..Default::default()
        };

        let result: Result<&str> = with_retry(&config, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("just in time")
        })
        .await;

        assert_eq!(result.unwrap(), "just in time");
    }
}
