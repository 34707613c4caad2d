use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::models::MediaItemId;

/// What the playback core needs to know about downloaded media.
#[async_trait]
pub trait DownloadInventory: Send + Sync {
    async fn is_downloaded(&self, item_id: &MediaItemId) -> bool;
    async fn local_path(&self, item_id: &MediaItemId) -> Option<PathBuf>;
    async fn total_bytes(&self) -> Result<u64>;
    async fn downloaded_items(&self) -> Result<Vec<MediaItemId>>;
    async fn delete_all(&self) -> Result<()>;
}

/// Inventory backed by a single directory; each file's stem is the item id.
///
/// Files with a `.part` extension are downloads in progress and are ignored.
#[derive(Debug, Clone)]
pub struct FileDownloadInventory {
    root: PathBuf,
}

impl FileDownloadInventory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{data_dir}/jellyplay/downloads`
    pub fn default_location() -> Result<Self> {
        let data_dir = dirs::data_dir().context("Failed to get data directory")?;
        Ok(Self::new(data_dir.join("jellyplay").join("downloads")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn entries(&self) -> Result<Vec<(MediaItemId, PathBuf, u64)>> {
        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read download directory {:?}", self.root));
            }
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to list download directory")?
        {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || is_partial(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                entries.push((MediaItemId::new(stem), path.clone(), metadata.len()));
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "part")
}

#[async_trait]
impl DownloadInventory for FileDownloadInventory {
    async fn is_downloaded(&self, item_id: &MediaItemId) -> bool {
        self.local_path(item_id).await.is_some()
    }

    async fn local_path(&self, item_id: &MediaItemId) -> Option<PathBuf> {
        match self.entries().await {
            Ok(entries) => entries
                .into_iter()
                .find(|(id, _, _)| id == item_id)
                .map(|(_, path, _)| path),
            Err(e) => {
                warn!("Failed to look up download for {}: {}", item_id, e);
                None
            }
        }
    }

    async fn total_bytes(&self) -> Result<u64> {
        Ok(self.entries().await?.iter().map(|(_, _, size)| size).sum())
    }

    async fn downloaded_items(&self) -> Result<Vec<MediaItemId>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|(id, _, _)| id)
            .collect())
    }

    async fn delete_all(&self) -> Result<()> {
        let entries = self.entries().await?;
        for (id, path, _) in &entries {
            debug!("Deleting download for {}", id);
            fs::remove_file(path)
                .await
                .with_context(|| format!("Failed to delete {:?}", path))?;
        }
        info!("Deleted {} downloaded items", entries.len());
        Ok(())
    }
}
