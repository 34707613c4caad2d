use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::downloads::DownloadInventory;
use crate::config::NetworkConfig;
use crate::models::{MediaItemId, NetworkType, OfflineStorageInfo, PlaybackSource};

pub type RegistrationId = u64;

/// Capabilities of the active network as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkCapabilities {
    pub has_internet: bool,
    /// False behind captive portals until the user signs in
    pub validated: bool,
    pub transport: NetworkType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Available(NetworkCapabilities),
    Lost,
    CapabilitiesChanged(NetworkCapabilities),
}

/// OS connectivity service. Registrations must be undone with `unregister`.
pub trait NetworkMonitor: Send + Sync {
    fn register(&self, sink: mpsc::UnboundedSender<ConnectivityEvent>) -> RegistrationId;
    fn unregister(&self, registration: RegistrationId);
    fn current(&self) -> Option<NetworkCapabilities>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    pub is_online: bool,
    pub network_type: NetworkType,
}

impl ConnectivityState {
    fn from_capabilities(caps: &NetworkCapabilities) -> Self {
        Self {
            is_online: caps.has_internet && caps.validated,
            network_type: caps.transport,
        }
    }
}

/// Tracks connectivity and answers local-vs-remote questions for playback.
///
/// Registers with the monitor on construction. Must be created inside a
/// Tokio runtime; the registration is undone by `cleanup()` or on drop.
pub struct ConnectivityResolver {
    monitor: Arc<dyn NetworkMonitor>,
    inventory: Arc<dyn DownloadInventory>,
    allow_cellular_streaming: bool,
    state_rx: watch::Receiver<ConnectivityState>,
    offline_items: RwLock<Vec<MediaItemId>>,
    registration: Mutex<Option<RegistrationId>>,
    listener: CancellationToken,
}

impl ConnectivityResolver {
    pub fn new(
        monitor: Arc<dyn NetworkMonitor>,
        inventory: Arc<dyn DownloadInventory>,
        config: &NetworkConfig,
    ) -> Self {
        let initial = monitor
            .current()
            .map(|caps| ConnectivityState::from_capabilities(&caps))
            .unwrap_or_default();
        let (state_tx, state_rx) = watch::channel(initial);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let registration = monitor.register(event_tx);
        let listener = CancellationToken::new();
        tokio::spawn(Self::listen(event_rx, state_tx, listener.clone()));

        info!(
            "Connectivity resolver registered (online: {}, type: {:?})",
            initial.is_online, initial.network_type
        );

        Self {
            monitor,
            inventory,
            allow_cellular_streaming: config.allow_cellular_streaming,
            state_rx,
            offline_items: RwLock::new(Vec::new()),
            registration: Mutex::new(Some(registration)),
            listener,
        }
    }

    async fn listen(
        mut events: mpsc::UnboundedReceiver<ConnectivityEvent>,
        state_tx: watch::Sender<ConnectivityState>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let state = match event {
                ConnectivityEvent::Available(caps)
                | ConnectivityEvent::CapabilitiesChanged(caps) => {
                    ConnectivityState::from_capabilities(&caps)
                }
                ConnectivityEvent::Lost => ConnectivityState::default(),
            };
            debug!("Connectivity event {:?} -> {:?}", event, state);
            state_tx.send_replace(state);
        }
        debug!("Connectivity listener stopped");
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state_rx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online
    }

    pub fn network_type(&self) -> NetworkType {
        self.state().network_type
    }

    pub async fn is_available_offline(&self, item_id: &MediaItemId) -> bool {
        self.inventory.is_downloaded(item_id).await
    }

    pub async fn offline_file_path(&self, item_id: &MediaItemId) -> Option<PathBuf> {
        self.inventory.local_path(item_id).await
    }

    /// Any validated connection qualifies, unless cellular is disallowed
    pub fn is_network_suitable_for_streaming(&self) -> bool {
        let state = self.state();
        state.is_online
            && (self.allow_cellular_streaming || state.network_type != NetworkType::Cellular)
    }

    /// Downloaded copies always win, even when online
    pub async fn suggest_playback_source(&self, item_id: &MediaItemId) -> PlaybackSource {
        if let Some(path) = self.offline_file_path(item_id).await {
            debug!("Using offline copy of {} at {:?}", item_id, path);
            return PlaybackSource::Local(path);
        }

        if self.is_network_suitable_for_streaming() {
            PlaybackSource::Stream
        } else {
            debug!(
                "No offline copy of {} and network unsuitable ({:?})",
                item_id,
                self.state()
            );
            PlaybackSource::Unavailable
        }
    }

    pub async fn offline_storage_usage(&self) -> Result<OfflineStorageInfo> {
        let (total_bytes, items) = futures::try_join!(
            self.inventory.total_bytes(),
            self.inventory.downloaded_items()
        )?;
        Ok(OfflineStorageInfo {
            total_bytes,
            item_count: items.len(),
            formatted_size: format_bytes(total_bytes),
        })
    }

    pub async fn offline_items(&self) -> Vec<MediaItemId> {
        self.offline_items.read().await.clone()
    }

    /// Reload the in-memory list of downloaded items
    pub async fn refresh_offline_content(&self) -> Result<usize> {
        let items = self.inventory.downloaded_items().await?;
        let count = items.len();
        *self.offline_items.write().await = items;
        debug!("Offline content refreshed: {} items", count);
        Ok(count)
    }

    pub async fn clear_offline_content(&self) -> bool {
        match self.inventory.delete_all().await {
            Ok(()) => {
                self.offline_items.write().await.clear();
                info!("Offline content cleared");
                true
            }
            Err(e) => {
                error!("Failed to clear offline content: {:#}", e);
                false
            }
        }
    }

    /// Unregister from the monitor and stop listening. Safe to call twice.
    pub fn cleanup(&self) {
        let registration = match self.registration.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(registration) = registration {
            self.monitor.unregister(registration);
            self.listener.cancel();
            info!("Connectivity resolver unregistered");
        }
    }
}

impl Drop for ConnectivityResolver {
    fn drop(&mut self) {
        let registered = self
            .registration
            .get_mut()
            .map(|r| r.is_some())
            .unwrap_or(true);
        if registered {
            warn!("Connectivity resolver dropped without cleanup");
            self.cleanup();
        }
    }
}

/// Binary units with one decimal, e.g. `1536` -> `"1.5 KB"`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
