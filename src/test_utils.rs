#![cfg(test)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::backends::MediaCatalog;
use crate::models::{
    MediaItem, MediaItemId, MediaSourceId, MediaSourceProfile, NetworkType, Resolution,
};
use crate::player::types::{
    EngineEvent, EngineTrackFormat, EngineTrackGroup, MediaReference, PlayerState,
    TrackSelectionParameters, TrackType,
};
use crate::player::PlaybackEngine;
use crate::resilience::ApiError;
use crate::services::{
    ConnectivityEvent, DownloadInventory, MemoryPositionStore, NetworkCapabilities,
    NetworkMonitor, PositionStore, RegistrationId,
};

/// Ordered record of side effects shared between mocks
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn wifi() -> NetworkCapabilities {
    NetworkCapabilities {
        has_internet: true,
        validated: true,
        transport: NetworkType::WiFi,
    }
}

/// 1080p HEVC item with a 100 minute runtime
pub fn sample_item(id: &str, bitrate: u64) -> MediaItem {
    MediaItem {
        id: MediaItemId::new(id),
        name: format!("Movie {}", id),
        run_time: Some(Duration::from_secs(6000)),
        media_sources: vec![MediaSourceProfile {
            id: MediaSourceId::new(format!("{}-source", id)),
            container: Some("mkv".to_string()),
            video_codec: Some("hevc".to_string()),
            audio_codec: Some("aac".to_string()),
            bitrate: Some(bitrate),
            resolution: Some(Resolution::new(1920, 1080)),
            bandwidth_ceiling: None,
            direct_stream_path: None,
            streams: Vec::new(),
        }],
    }
}

/// Two single-track audio groups, one text group with two tracks, one video group
pub fn sample_track_groups() -> Vec<EngineTrackGroup> {
    vec![
        EngineTrackGroup {
            track_type: TrackType::Audio,
            formats: vec![EngineTrackFormat {
                id: Some("a1".to_string()),
                language: Some("en".to_string()),
                channel_count: Some(6),
                bitrate: Some(640_000),
                selected: true,
                ..Default::default()
            }],
        },
        EngineTrackGroup {
            track_type: TrackType::Audio,
            formats: vec![EngineTrackFormat {
                id: Some("a2".to_string()),
                language: Some("ja".to_string()),
                channel_count: Some(2),
                bitrate: Some(192_000),
                ..Default::default()
            }],
        },
        EngineTrackGroup {
            track_type: TrackType::Text,
            formats: vec![
                EngineTrackFormat {
                    id: Some("s1".to_string()),
                    language: Some("en".to_string()),
                    ..Default::default()
                },
                EngineTrackFormat {
                    id: Some("s2".to_string()),
                    language: Some("fr".to_string()),
                    forced: true,
                    ..Default::default()
                },
            ],
        },
        EngineTrackGroup {
            track_type: TrackType::Video,
            formats: vec![EngineTrackFormat {
                id: Some("v1".to_string()),
                selected: true,
                ..Default::default()
            }],
        },
    ]
}

#[derive(Debug)]
struct EngineInner {
    loaded: Option<MediaReference>,
    load_count: u32,
    state: PlayerState,
    position: Duration,
    duration: Option<Duration>,
    buffer: Option<f64>,
    groups: Vec<EngineTrackGroup>,
    params: TrackSelectionParameters,
    fail_selection: bool,
    fail_load: bool,
    released: bool,
}

/// Scriptable engine; clones share state so tests can observe the session's copy
#[derive(Debug, Clone)]
pub struct MockEngine {
    inner: Arc<Mutex<EngineInner>>,
    sink: Arc<Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>>,
    journal: Option<Journal>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_tracks(Vec::new())
    }

    pub fn with_tracks(groups: Vec<EngineTrackGroup>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                loaded: None,
                load_count: 0,
                state: PlayerState::Idle,
                position: Duration::ZERO,
                duration: Some(Duration::from_secs(6000)),
                buffer: None,
                groups,
                params: TrackSelectionParameters::default(),
                fail_selection: false,
                fail_load: false,
                released: false,
            })),
            sink: Arc::new(Mutex::new(None)),
            journal: None,
        }
    }

    pub fn journaled(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    fn record(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }

    pub fn loaded(&self) -> Option<MediaReference> {
        self.inner.lock().unwrap().loaded.clone()
    }

    pub fn load_count(&self) -> u32 {
        self.inner.lock().unwrap().load_count
    }

    pub fn set_position(&self, position: Duration) {
        self.inner.lock().unwrap().position = position;
    }

    pub fn set_buffer(&self, buffer: Option<f64>) {
        self.inner.lock().unwrap().buffer = buffer;
    }

    pub fn fail_track_selection(&self, fail: bool) {
        self.inner.lock().unwrap().fail_selection = fail;
    }

    pub fn fail_load(&self, fail: bool) {
        self.inner.lock().unwrap().fail_load = fail;
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().unwrap().released
    }

    /// Deliver an event as the engine's listener thread would
    pub fn emit(&self, event: EngineEvent) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(event);
        }
    }
}

#[async_trait]
impl PlaybackEngine for MockEngine {
    fn set_event_sink(&self, sink: mpsc::UnboundedSender<EngineEvent>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn load_media(&self, media: &MediaReference) -> Result<()> {
        self.record("load");
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_load {
            return Err(anyhow!("unsupported format"));
        }
        inner.loaded = Some(media.clone());
        inner.load_count += 1;
        inner.position = media.start_position;
        inner.state = PlayerState::Paused;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record("play");
        self.inner.lock().unwrap().state = PlayerState::Playing;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause");
        self.inner.lock().unwrap().state = PlayerState::Paused;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.record("seek");
        self.inner.lock().unwrap().position = position;
        Ok(())
    }

    async fn get_position(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        inner.loaded.as_ref().map(|_| inner.position)
    }

    async fn get_duration(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        inner.loaded.as_ref().and(inner.duration)
    }

    async fn get_buffer_percentage(&self) -> Option<f64> {
        self.inner.lock().unwrap().buffer
    }

    async fn get_state(&self) -> PlayerState {
        self.inner.lock().unwrap().state.clone()
    }

    async fn current_tracks(&self) -> Vec<EngineTrackGroup> {
        self.inner.lock().unwrap().groups.clone()
    }

    async fn track_selection_parameters(&self) -> TrackSelectionParameters {
        self.inner.lock().unwrap().params.clone()
    }

    async fn set_track_selection_parameters(&self, params: TrackSelectionParameters) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_selection {
            return Err(anyhow!("track selection rejected"));
        }
        inner.params = params;
        Ok(())
    }

    async fn release(&self) {
        self.record("release");
        let mut inner = self.inner.lock().unwrap();
        inner.released = true;
        inner.loaded = None;
        inner.state = PlayerState::Stopped;
    }
}

/// In-memory download list; paths look like `/downloads/{id}.mkv`
#[derive(Debug, Default)]
pub struct MockInventory {
    items: Mutex<Vec<(MediaItemId, u64)>>,
    fail_delete: AtomicBool,
}

impl MockInventory {
    pub fn with_items(items: &[(&str, u64)]) -> Self {
        Self {
            items: Mutex::new(
                items
                    .iter()
                    .map(|(id, size)| (MediaItemId::new(*id), *size))
                    .collect(),
            ),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DownloadInventory for MockInventory {
    async fn is_downloaded(&self, item_id: &MediaItemId) -> bool {
        self.items.lock().unwrap().iter().any(|(id, _)| id == item_id)
    }

    async fn local_path(&self, item_id: &MediaItemId) -> Option<PathBuf> {
        self.is_downloaded(item_id)
            .await
            .then(|| PathBuf::from(format!("/downloads/{}.mkv", item_id)))
    }

    async fn total_bytes(&self) -> Result<u64> {
        Ok(self.items.lock().unwrap().iter().map(|(_, size)| size).sum())
    }

    async fn downloaded_items(&self) -> Result<Vec<MediaItemId>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_all(&self) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(anyhow!("storage busy"));
        }
        self.items.lock().unwrap().clear();
        Ok(())
    }
}

/// Connectivity service double that fans events out to every registration
#[derive(Debug)]
pub struct MockMonitor {
    current: Mutex<Option<NetworkCapabilities>>,
    sinks: Mutex<HashMap<RegistrationId, mpsc::UnboundedSender<ConnectivityEvent>>>,
    next_id: AtomicU64,
    unregister_calls: AtomicU32,
}

impl MockMonitor {
    pub fn new(current: Option<NetworkCapabilities>) -> Self {
        Self {
            current: Mutex::new(current),
            sinks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            unregister_calls: AtomicU32::new(0),
        }
    }

    pub fn emit(&self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::Available(caps) | ConnectivityEvent::CapabilitiesChanged(caps) => {
                *self.current.lock().unwrap() = Some(caps);
            }
            ConnectivityEvent::Lost => *self.current.lock().unwrap() = None,
        }
        for sink in self.sinks.lock().unwrap().values() {
            let _ = sink.send(event);
        }
    }

    pub fn active_registrations(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn unregister_calls(&self) -> u32 {
        self.unregister_calls.load(Ordering::SeqCst)
    }
}

impl NetworkMonitor for MockMonitor {
    fn register(&self, sink: mpsc::UnboundedSender<ConnectivityEvent>) -> RegistrationId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().insert(id, sink);
        id
    }

    fn unregister(&self, registration: RegistrationId) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().remove(&registration);
    }

    fn current(&self) -> Option<NetworkCapabilities> {
        *self.current.lock().unwrap()
    }
}

#[derive(Debug, Default)]
pub struct MockCatalog {
    items: Mutex<HashMap<MediaItemId, MediaItem>>,
    failure: Mutex<Option<ApiError>>,
    calls: AtomicU32,
}

impl MockCatalog {
    pub fn with_items(items: Vec<MediaItem>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().map(|i| (i.id.clone(), i)).collect()),
            ..Default::default()
        }
    }

    /// Every following call fails with `error`
    pub fn fail_with(&self, error: ApiError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaCatalog for MockCatalog {
    async fn get_item(&self, item_id: &MediaItemId) -> Result<MediaItem, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.items
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(item_id.to_string()))
    }
}

/// Memory store that also writes "persist" to the journal on every save
#[derive(Debug)]
pub struct JournalingPositionStore {
    inner: MemoryPositionStore,
    journal: Journal,
}

impl JournalingPositionStore {
    pub fn new(inner: MemoryPositionStore, journal: Journal) -> Self {
        Self { inner, journal }
    }
}

#[async_trait]
impl PositionStore for JournalingPositionStore {
    async fn load_position(&self, item_id: &MediaItemId) -> Result<Option<Duration>> {
        self.inner.load_position(item_id).await
    }

    async fn save_position(
        &self,
        item_id: &MediaItemId,
        position: Duration,
        duration: Option<Duration>,
    ) -> Result<()> {
        self.journal.record("persist");
        self.inner.save_position(item_id, position, duration).await
    }
}
