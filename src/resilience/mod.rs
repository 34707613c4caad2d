//! Retry-with-backoff and circuit breaking for network-bound calls.

pub mod circuit_breaker;
pub mod errors;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState, CircuitState};
pub use errors::{ApiError, ErrorKind};
pub use retry::RetryPolicy;

use std::future::Future;
use std::sync::Arc;

use crate::config::NetworkConfig;

/// Retry policy plus a shared breaker registry.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    default_attempts: u32,
}

impl Default for ResilientExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), CircuitBreaker::global(), 3)
    }
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy, breaker: Arc<CircuitBreaker>, default_attempts: u32) -> Self {
        Self {
            policy,
            breaker,
            default_attempts: default_attempts.max(1),
        }
    }

    /// Executor with its own breaker registry tuned from `config`
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(
            RetryPolicy::from_config(config),
            Arc::new(CircuitBreaker::from_config(config)),
            config.max_attempts,
        )
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn default_attempts(&self) -> u32 {
        self.default_attempts
    }

    pub async fn with_retry<F, Fut, T>(
        &self,
        operation_name: &str,
        max_attempts: u32,
        f: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.policy.with_retry(operation_name, max_attempts, f).await
    }

    /// Whole retry loop behind the breaker gate for `key`
    ///
    /// An open circuit short-circuits before the first attempt, and the
    /// breaker sees exactly one outcome per call regardless of retries.
    pub async fn with_retry_and_circuit_breaker<F, Fut, T>(
        &self,
        key: &str,
        max_attempts: u32,
        f: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.breaker
            .call(key, || self.policy.with_retry(key, max_attempts, f))
            .await
    }
}
