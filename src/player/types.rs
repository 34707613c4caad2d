//! Common types shared between the session controller and engine backends
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::models::Resolution;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerState {
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video,
    Audio,
    Text,
}

impl TrackType {
    /// Prefix used when composing stable track ids
    pub fn tag(&self) -> &'static str {
        match self {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
            TrackType::Text => "text",
        }
    }
}

/// A single format inside an engine track group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineTrackFormat {
    pub id: Option<String>,
    pub language: Option<String>,
    pub label: Option<String>,
    pub channel_count: Option<u32>,
    pub bitrate: Option<u64>,
    pub forced: bool,
    pub selected: bool,
}

/// Track group as reported by the engine on every track change
#[derive(Debug, Clone, PartialEq)]
pub struct EngineTrackGroup {
    pub track_type: TrackType,
    pub formats: Vec<EngineTrackFormat>,
}

/// Position of a format inside the engine's current track groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackOverride {
    pub group_index: usize,
    pub track_index: usize,
}

/// Engine-side selection parameters, mutated by the track selector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSelectionParameters {
    disabled_track_types: HashSet<TrackType>,
    overrides: HashMap<TrackType, TrackOverride>,
}

impl TrackSelectionParameters {
    pub fn set_track_type_disabled(&mut self, track_type: TrackType, disabled: bool) -> &mut Self {
        if disabled {
            self.disabled_track_types.insert(track_type);
        } else {
            self.disabled_track_types.remove(&track_type);
        }
        self
    }

    pub fn is_track_type_disabled(&self, track_type: TrackType) -> bool {
        self.disabled_track_types.contains(&track_type)
    }

    pub fn set_override(&mut self, track_type: TrackType, target: TrackOverride) -> &mut Self {
        self.overrides.insert(track_type, target);
        self
    }

    pub fn clear_override(&mut self, track_type: TrackType) -> &mut Self {
        self.overrides.remove(&track_type);
        self
    }

    pub fn override_for(&self, track_type: TrackType) -> Option<TrackOverride> {
        self.overrides.get(&track_type).copied()
    }
}

/// What the engine is asked to open
#[derive(Debug, Clone, PartialEq)]
pub struct MediaReference {
    pub uri: String,
    pub start_position: Duration,
    pub is_local: bool,
}

/// Callbacks from the engine, delivered as messages
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(PlayerState),
    Buffering(bool),
    Error(String),
    TracksChanged,
    VideoSizeChanged(Resolution),
}
