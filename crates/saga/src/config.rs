//! Saga execution settings loaded from environment variables.

use std::time::Duration;

/// Exponential backoff applied to the bounded collaborator calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        if !scaled.is_finite() || scaled >= self.maximum_interval.as_secs_f64() {
            return self.maximum_interval;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
        }
    }
}

/// Settings for one saga run.
///
/// Reads from environment variables:
/// - `SAGA_ACTIVITY_TIMEOUT_SECS`: per-attempt deadline for split and charge calls (default: `30`)
/// - `SAGA_RETRY_MAX_ATTEMPTS`: attempts per bounded call (default: `3`)
/// - `SAGA_RETRY_INITIAL_INTERVAL_MS`: first backoff delay (default: `1000`)
/// - `SAGA_SIGNAL_BUFFER`: signals buffered per saga before senders wait (default: `64`)
#[derive(Debug, Clone, PartialEq)]
pub struct SagaConfig {
    pub activity_timeout: Duration,
    pub retry: RetryPolicy,
    pub signal_buffer: usize,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            activity_timeout: env_parse("SAGA_ACTIVITY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.activity_timeout),
            retry: RetryPolicy {
                max_attempts: env_parse("SAGA_RETRY_MAX_ATTEMPTS")
                    .map(|n: u32| n.max(1))
                    .unwrap_or(defaults.retry.max_attempts),
                initial_interval: env_parse("SAGA_RETRY_INITIAL_INTERVAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.initial_interval),
                ..defaults.retry
            },
            signal_buffer: env_parse("SAGA_SIGNAL_BUFFER")
                .map(|n: usize| n.max(1))
                .unwrap_or(defaults.signal_buffer),
        }
    }

    /// Overrides the per-attempt deadline.
    pub fn with_activity_timeout(mut self, timeout: Duration) -> Self {
        self.activity_timeout = timeout;
        self
    }

    /// Overrides the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            activity_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            signal_buffer: 64,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SagaConfig::default();
        assert_eq!(config.activity_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.signal_buffer, 64);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_interval: Duration::from_millis(100),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
