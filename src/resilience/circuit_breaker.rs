use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use crate::config::NetworkConfig;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

// Process-wide breaker registry shared by every caller
static CIRCUIT_BREAKERS: Lazy<Arc<CircuitBreaker>> =
    Lazy::new(|| Arc::new(CircuitBreaker::default()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-operation breaker record
#[derive(Debug, Clone)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
    pub last_success_time: Option<Instant>,
    /// Set while the single half-open trial is running
    trial_started: Option<Instant>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            last_success_time: None,
            trial_started: None,
        }
    }
}

/// Circuit breakers keyed by logical operation name.
///
/// Records are created lazily on first use and live as long as the
/// registry. Every transition happens under that key's own lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    records: RwLock<HashMap<String, Arc<Mutex<CircuitBreakerState>>>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_OPEN_TIMEOUT)
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(
            config.circuit_failure_threshold,
            config.circuit_open_timeout(),
        )
    }

    /// Get the process-wide registry
    pub fn global() -> Arc<CircuitBreaker> {
        CIRCUIT_BREAKERS.clone()
    }

    async fn record(&self, key: &str) -> Arc<Mutex<CircuitBreakerState>> {
        if let Some(record) = self.records.read().await.get(key) {
            return record.clone();
        }

        self.records
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Copy of the current record for `key`, if it was ever used
    pub async fn snapshot(&self, key: &str) -> Option<CircuitBreakerState> {
        let record = self.records.read().await.get(key).cloned()?;
        let state = record.lock().await.clone();
        Some(state)
    }

    /// Gate a call: `Ok` lets it through, `Err` rejects it locally
    ///
    /// Only a timestamp comparison, never waits for the reset window.
    pub async fn try_acquire(&self, key: &str) -> Result<(), ApiError> {
        self.acquire(key).await.map(|_| ())
    }

    /// Like `try_acquire`, returning the record when the caller holds the trial
    async fn acquire(
        &self,
        key: &str,
    ) -> Result<Option<Arc<Mutex<CircuitBreakerState>>>, ApiError> {
        let shared = self.record(key).await;
        let mut record = shared.lock().await;

        match record.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                let window_elapsed = record
                    .last_failure_time
                    .map(|at| at.elapsed() > self.open_timeout)
                    .unwrap_or(true);

                if window_elapsed {
                    info!("{}: Circuit half-open, allowing trial call", key);
                    record.state = CircuitState::HalfOpen;
                    record.trial_started = Some(Instant::now());
                    Ok(Some(shared.clone()))
                } else {
                    debug!("{}: Circuit open, rejecting call", key);
                    Err(ApiError::ServiceUnavailable {
                        key: key.to_string(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                // A trial that never reported within the window was abandoned
                let busy = record
                    .trial_started
                    .is_some_and(|at| at.elapsed() <= self.open_timeout);

                if busy {
                    Err(ApiError::ServiceUnavailable {
                        key: key.to_string(),
                    })
                } else {
                    debug!("{}: Starting new half-open trial", key);
                    record.trial_started = Some(Instant::now());
                    Ok(Some(shared.clone()))
                }
            }
        }
    }

    pub async fn on_success(&self, key: &str) {
        let record = self.record(key).await;
        let mut record = record.lock().await;

        if record.state != CircuitState::Closed {
            info!("{}: Circuit closed after successful call", key);
        }
        record.state = CircuitState::Closed;
        record.failure_count = 0;
        record.trial_started = None;
        record.last_success_time = Some(Instant::now());
    }

    pub async fn on_failure(&self, key: &str) {
        let record = self.record(key).await;
        let mut record = record.lock().await;

        record.failure_count = record.failure_count.saturating_add(1);
        record.last_failure_time = Some(Instant::now());

        match record.state {
            CircuitState::Closed => {
                if record.failure_count >= self.failure_threshold {
                    warn!(
                        "{}: Circuit opened after {} consecutive failures",
                        key, record.failure_count
                    );
                    record.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("{}: Trial call failed, circuit re-opened", key);
                record.state = CircuitState::Open;
                record.trial_started = None;
            }
            CircuitState::Open => {}
        }
    }

    /// A gated call ended without an outcome (cancelled)
    async fn on_abandoned(&self, key: &str) {
        let record = self.record(key).await;
        record.lock().await.trial_started = None;
    }

    /// Run `f` behind the breaker for `key`, reporting its outcome once
    pub async fn call<F, Fut, T>(&self, key: &str, f: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut trial = TrialGuard(self.acquire(key).await?);
        let result = f().await;
        trial.disarm();

        match result {
            Ok(value) => {
                self.on_success(key).await;
                Ok(value)
            }
            Err(ApiError::Cancelled) => {
                self.on_abandoned(key).await;
                Err(ApiError::Cancelled)
            }
            Err(err) => {
                self.on_failure(key).await;
                Err(err)
            }
        }
    }
}

/// Frees the half-open trial when a gated call is dropped mid-flight
struct TrialGuard(Option<Arc<Mutex<CircuitBreakerState>>>);

impl TrialGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for TrialGuard {
    fn drop(&mut self) {
        if let Some(record) = self.0.take() {
            // Contended lock: the stale-trial window in `acquire` recovers it
            if let Ok(mut record) = record.try_lock() {
                record.trial_started = None;
            }
        }
    }
}
