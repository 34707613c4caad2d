use anyhow::Result;
use async_trait::async_trait;
use jellyplay::models::NetworkType;
use jellyplay::player::{
    EngineEvent, EngineTrackFormat, EngineTrackGroup, MediaReference, PlaybackEngine,
    PlayerState, TrackSelectionParameters, TrackType,
};
use jellyplay::services::{ConnectivityEvent, NetworkCapabilities, NetworkMonitor, RegistrationId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct EngineRecord {
    pub loads: Vec<MediaReference>,
    pub position: Duration,
    pub state: Option<PlayerState>,
    pub params: TrackSelectionParameters,
    pub released: bool,
}

/// Engine double whose clones share one record
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    pub record: Arc<Mutex<EngineRecord>>,
    sink: Arc<Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>>,
}

impl RecordingEngine {
    pub fn set_position(&self, position: Duration) {
        self.record.lock().unwrap().position = position;
    }

    pub fn last_load(&self) -> Option<MediaReference> {
        self.record.lock().unwrap().loads.last().cloned()
    }

    pub fn is_released(&self) -> bool {
        self.record.lock().unwrap().released
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(event);
        }
    }
}

#[async_trait]
impl PlaybackEngine for RecordingEngine {
    fn set_event_sink(&self, sink: mpsc::UnboundedSender<EngineEvent>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn load_media(&self, media: &MediaReference) -> Result<()> {
        let mut record = self.record.lock().unwrap();
        record.position = media.start_position;
        record.loads.push(media.clone());
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record.lock().unwrap().state = Some(PlayerState::Playing);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record.lock().unwrap().state = Some(PlayerState::Paused);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.record.lock().unwrap().position = position;
        Ok(())
    }

    async fn get_position(&self) -> Option<Duration> {
        Some(self.record.lock().unwrap().position)
    }

    async fn get_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(7200))
    }

    async fn get_buffer_percentage(&self) -> Option<f64> {
        Some(100.0)
    }

    async fn get_state(&self) -> PlayerState {
        self.record
            .lock()
            .unwrap()
            .state
            .clone()
            .unwrap_or(PlayerState::Idle)
    }

    async fn current_tracks(&self) -> Vec<EngineTrackGroup> {
        vec![
            EngineTrackGroup {
                track_type: TrackType::Audio,
                formats: vec![EngineTrackFormat {
                    id: Some("1".to_string()),
                    language: Some("eng".to_string()),
                    channel_count: Some(6),
                    selected: true,
                    ..Default::default()
                }],
            },
            EngineTrackGroup {
                track_type: TrackType::Text,
                formats: vec![EngineTrackFormat {
                    id: Some("3".to_string()),
                    language: Some("spa".to_string()),
                    ..Default::default()
                }],
            },
        ]
    }

    async fn track_selection_parameters(&self) -> TrackSelectionParameters {
        self.record.lock().unwrap().params.clone()
    }

    async fn set_track_selection_parameters(&self, params: TrackSelectionParameters) -> Result<()> {
        self.record.lock().unwrap().params = params;
        Ok(())
    }

    async fn release(&self) {
        self.record.lock().unwrap().released = true;
    }
}

/// Monitor reporting a fixed network; never emits events
#[derive(Debug)]
pub struct FixedMonitor {
    pub capabilities: Option<NetworkCapabilities>,
    pub registrations: Mutex<Vec<RegistrationId>>,
}

impl FixedMonitor {
    pub fn online() -> Self {
        Self::with(Some(NetworkCapabilities {
            has_internet: true,
            validated: true,
            transport: NetworkType::Ethernet,
        }))
    }

    pub fn offline() -> Self {
        Self::with(None)
    }

    fn with(capabilities: Option<NetworkCapabilities>) -> Self {
        Self {
            capabilities,
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl NetworkMonitor for FixedMonitor {
    fn register(&self, _sink: mpsc::UnboundedSender<ConnectivityEvent>) -> RegistrationId {
        let mut registrations = self.registrations.lock().unwrap();
        let id = registrations.len() as RegistrationId + 1;
        registrations.push(id);
        id
    }

    fn unregister(&self, registration: RegistrationId) {
        self.registrations
            .lock()
            .unwrap()
            .retain(|r| *r != registration);
    }

    fn current(&self) -> Option<NetworkCapabilities> {
        self.capabilities
    }
}
