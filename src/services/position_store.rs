use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::models::MediaItemId;

/// Resume point of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackProgress {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl PlaybackProgress {
    pub fn new(position: Duration, duration: Option<Duration>) -> Self {
        Self {
            position_ms: position.as_millis() as u64,
            duration_ms: duration.map(|d| d.as_millis() as u64),
            updated_at: Utc::now(),
        }
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms)
    }
}

/// Key-value store of item id to last playback position.
#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn load_position(&self, item_id: &MediaItemId) -> Result<Option<Duration>>;
    async fn save_position(
        &self,
        item_id: &MediaItemId,
        position: Duration,
        duration: Option<Duration>,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    entries: RwLock<HashMap<MediaItemId, PlaybackProgress>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn progress(&self, item_id: &MediaItemId) -> Option<PlaybackProgress> {
        self.entries.read().await.get(item_id).cloned()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn load_position(&self, item_id: &MediaItemId) -> Result<Option<Duration>> {
        Ok(self.progress(item_id).await.map(|p| p.position()))
    }

    async fn save_position(
        &self,
        item_id: &MediaItemId,
        position: Duration,
        duration: Option<Duration>,
    ) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(item_id.clone(), PlaybackProgress::new(position, duration));
        Ok(())
    }
}

/// Positions kept in a single JSON document keyed by item id.
#[derive(Debug)]
pub struct FilePositionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `{data_dir}/jellyplay/positions.json`
    pub fn default_location() -> Result<Self> {
        let data_dir = dirs::data_dir().context("Failed to get data directory")?;
        Ok(Self::new(data_dir.join("jellyplay").join("positions.json")))
    }

    async fn read_all(&self) -> Result<HashMap<String, PlaybackProgress>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e).context("Failed to read position file"),
        };

        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Position file {:?} is corrupt, starting fresh: {}", self.path, e);
                Ok(HashMap::new())
            }
        }
    }
}

#[async_trait]
impl PositionStore for FilePositionStore {
    async fn load_position(&self, item_id: &MediaItemId) -> Result<Option<Duration>> {
        let entries = self.read_all().await?;
        Ok(entries.get(item_id.as_str()).map(|p| p.position()))
    }

    async fn save_position(
        &self,
        item_id: &MediaItemId,
        position: Duration,
        duration: Option<Duration>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_all().await?;
        entries.insert(
            item_id.to_string(),
            PlaybackProgress::new(position, duration),
        );

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create position directory")?;
        }

        let contents =
            serde_json::to_string_pretty(&entries).context("Failed to serialize positions")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)
            .await
            .context("Failed to write position file")?;
        fs::rename(&tmp_path, &self.path)
            .await
            .context("Failed to replace position file")?;

        debug!("Saved position {:?} for {}", position, item_id);
        Ok(())
    }
}
