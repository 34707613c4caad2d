use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::errors::{ApiError, ErrorKind};
use crate::config::NetworkConfig;

/// Error classification and backoff schedule for retried operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay for exponential backoff (first retry uses this delay)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (caps exponential growth)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.retry_base_delay_ms, config.retry_max_delay_ms)
    }

    pub fn should_retry(&self, error: &ApiError) -> bool {
        error.is_retryable()
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based)
    ///
    /// Formula: min(base_delay * factor(kind) * 2^attempt, max_delay).
    /// Server errors back off twice as fast; rate limits honour the
    /// server's retry-after when present.
    pub fn backoff(&self, error: &ApiError, attempt: u32) -> Duration {
        if let Some(retry_after) = error.retry_after() {
            return Duration::from_secs(retry_after).min(Duration::from_millis(self.max_delay_ms));
        }

        let factor = match error.kind() {
            ErrorKind::Server | ErrorKind::RateLimited => 2,
            _ => 1,
        };

        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Execute an async operation up to `max_attempts` times
    ///
    /// Non-retryable errors are returned right away, cancellation is never
    /// retried. After the last attempt the last error is returned.
    pub async fn with_retry<F, Fut, T>(
        &self,
        operation_name: &str,
        max_attempts: u32,
        mut f: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > 1 {
                debug!(
                    "{}: Retry attempt {} of {}",
                    operation_name, attempt, max_attempts
                );
            }

            let err = match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("{}: Succeeded after {} attempts", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(err) => err,
            };

            if err.is_cancelled() {
                debug!("{}: Cancelled, not retrying", operation_name);
                return Err(err);
            }

            if !self.should_retry(&err) {
                warn!(
                    "{}: Non-retryable error, not retrying: {}",
                    operation_name, err
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!(
                    "{}: All {} attempts failed, last error: {}",
                    operation_name, max_attempts, err
                );
                return Err(err);
            }

            let delay = self.backoff(&err, attempt - 1);
            debug!(
                "{}: Transient error ({}), waiting {:?} before retry",
                operation_name, err, delay
            );
            sleep(delay).await;
        }
    }
}
