//! Bounded collaborator calls: per-attempt deadline plus retry with backoff.

use std::future::Future;

use crate::config::SagaConfig;
use crate::error::SagaError;

/// Runs `call` until it succeeds or the retry policy is exhausted.
///
/// Each attempt is bounded by `config.activity_timeout`; an attempt that
/// runs past it counts as a failure with [`SagaError::Timeout`]. The last
/// failure is returned.
pub(crate) async fn execute<T, F, Fut>(
    activity: &'static str,
    config: &SagaConfig,
    mut call: F,
) -> Result<T, SagaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SagaError>>,
{
    let attempts = config.retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(config.activity_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(SagaError::Timeout {
                activity,
                timeout: config.activity_timeout,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                metrics::counter!("activity_failures_total", "activity" => activity).increment(1);
                return Err(e);
            }
            Err(e) => {
                let delay = config.retry.backoff(attempt);
                tracing::warn!(activity, attempt, error = %e, ?delay, "activity attempt failed, retrying");
                metrics::counter!("activity_retries_total", "activity" => activity).increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn config(max_attempts: u32) -> SagaConfig {
        SagaConfig::default()
            .with_activity_timeout(Duration::from_millis(50))
            .with_retry(RetryPolicy {
                max_attempts,
                initial_interval: Duration::from_millis(1),
                backoff_coefficient: 1.0,
                maximum_interval: Duration::from_millis(1),
            })
    }

    #[tokio::test]
    async fn test_succeeds_first_time() {
        let result = execute("test", &config(3), || async { Ok::<_, SagaError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = execute("test", &config(3), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SagaError::Payment("flaky".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = execute("test", &config(2), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(SagaError::Payment("declined".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(SagaError::Payment(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let result: Result<(), _> = execute("slow", &config(1), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(SagaError::Timeout { activity: "slow", .. })
        ));
    }
}
