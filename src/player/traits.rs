use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use super::types::{
    EngineEvent, EngineTrackGroup, MediaReference, PlayerState, TrackSelectionParameters,
};

/// The playback engine a session drives. Owned by exactly one session.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Where state changes, buffering, errors and track changes are reported
    fn set_event_sink(&self, sink: mpsc::UnboundedSender<EngineEvent>);
    async fn load_media(&self, media: &MediaReference) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek(&self, position: Duration) -> Result<()>;
    async fn get_position(&self) -> Option<Duration>;
    async fn get_duration(&self) -> Option<Duration>;
    async fn get_buffer_percentage(&self) -> Option<f64>;
    async fn get_state(&self) -> PlayerState;
    async fn current_tracks(&self) -> Vec<EngineTrackGroup>;
    async fn track_selection_parameters(&self) -> TrackSelectionParameters;
    async fn set_track_selection_parameters(&self, params: TrackSelectionParameters)
    -> Result<()>;
    /// Free every engine resource; the engine is unusable afterwards
    async fn release(&self);
}
