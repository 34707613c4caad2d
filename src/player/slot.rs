use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Exclusive claim on the engine resources of one screen.
///
/// A session holds the lease until its engine has been released, so the
/// next session's `claim` only completes once the previous engine is gone.
#[derive(Debug, Clone)]
pub struct EngineSlot {
    permits: Arc<Semaphore>,
}

#[derive(Debug)]
pub struct EngineLease {
    _permit: OwnedSemaphorePermit,
}

impl Default for EngineSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait until the slot is free and take it
    pub async fn claim(&self) -> Result<EngineLease> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("Engine slot closed"))?;
        debug!("Engine slot claimed");
        Ok(EngineLease { _permit: permit })
    }

    pub fn try_claim(&self) -> Option<EngineLease> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| EngineLease { _permit: permit })
    }

    pub fn is_free(&self) -> bool {
        self.permits.available_permits() > 0
    }
}
