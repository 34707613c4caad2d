use std::collections::{HashMap, HashSet};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::languages;
use super::traits::PlaybackEngine;
use super::types::{EngineTrackFormat, EngineTrackGroup, TrackOverride, TrackType};

/// Id of the synthetic "subtitles off" entry
pub const SUBTITLE_OFF_ID: &str = "off";

#[derive(Debug, Clone, PartialEq)]
pub enum TrackKind {
    Audio {
        channels: Option<u32>,
        bitrate: Option<u64>,
    },
    Subtitle {
        forced: bool,
    },
    SubtitleOff,
}

/// User-facing audio or subtitle track
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// `"{type tag}-{format id}"`, stable while the underlying stream is
    pub id: String,
    pub language: Option<String>,
    pub label: String,
    pub selected: bool,
    pub kind: TrackKind,
}

impl Track {
    fn subtitles_off(selected: bool) -> Self {
        Self {
            id: SUBTITLE_OFF_ID.to_string(),
            language: None,
            label: "Off".to_string(),
            selected,
            kind: TrackKind::SubtitleOff,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSelectionState {
    pub audio_tracks: Vec<Track>,
    /// Always starts with the "off" entry
    pub subtitle_tracks: Vec<Track>,
    pub selected_audio_track_id: Option<String>,
    pub selected_subtitle_track_id: String,
    pub subtitles_enabled: bool,
}

impl Default for TrackSelectionState {
    fn default() -> Self {
        Self {
            audio_tracks: Vec::new(),
            subtitle_tracks: vec![Track::subtitles_off(true)],
            selected_audio_track_id: None,
            selected_subtitle_track_id: SUBTITLE_OFF_ID.to_string(),
            subtitles_enabled: false,
        }
    }
}

/// Builds the track lists from engine track groups and applies selections.
///
/// Every change publishes a whole new `TrackSelectionState`.
#[derive(Debug)]
pub struct TrackSelector {
    state_tx: watch::Sender<TrackSelectionState>,
    locations: HashMap<String, TrackOverride>,
}

impl Default for TrackSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSelector {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(TrackSelectionState::default());
        Self {
            state_tx,
            locations: HashMap::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackSelectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> TrackSelectionState {
        self.state_tx.borrow().clone()
    }

    fn publish(&self, state: TrackSelectionState) {
        self.state_tx.send_replace(state);
    }

    /// Rebuild both lists from the engine's current track groups
    pub fn refresh_tracks(&mut self, groups: &[EngineTrackGroup]) -> TrackSelectionState {
        let mut audio_tracks = Vec::new();
        let mut subtitle_tracks = Vec::new();
        let mut locations = HashMap::new();
        let mut seen = HashSet::new();

        for (group_index, group) in groups.iter().enumerate() {
            if group.track_type == TrackType::Video {
                continue;
            }

            for (track_index, format) in group.formats.iter().enumerate() {
                let id = track_id(group.track_type, format, group_index, track_index, &seen);
                seen.insert(id.clone());
                locations.insert(
                    id.clone(),
                    TrackOverride {
                        group_index,
                        track_index,
                    },
                );

                match group.track_type {
                    TrackType::Audio => {
                        let number = audio_tracks.len() + 1;
                        audio_tracks.push(Track {
                            label: audio_label(format, number),
                            id,
                            language: format.language.clone(),
                            selected: format.selected,
                            kind: TrackKind::Audio {
                                channels: format.channel_count,
                                bitrate: format.bitrate,
                            },
                        });
                    }
                    TrackType::Text => {
                        let number = subtitle_tracks.len() + 1;
                        subtitle_tracks.push(Track {
                            label: subtitle_label(format, number),
                            id,
                            language: format.language.clone(),
                            selected: format.selected,
                            kind: TrackKind::Subtitle {
                                forced: format.forced,
                            },
                        });
                    }
                    TrackType::Video => {}
                }
            }
        }

        let selected_subtitle = subtitle_tracks.iter().find(|t| t.selected).map(|t| t.id.clone());
        let subtitles_enabled = selected_subtitle.is_some();
        subtitle_tracks.insert(0, Track::subtitles_off(!subtitles_enabled));

        let state = TrackSelectionState {
            selected_audio_track_id: audio_tracks.iter().find(|t| t.selected).map(|t| t.id.clone()),
            selected_subtitle_track_id: selected_subtitle
                .unwrap_or_else(|| SUBTITLE_OFF_ID.to_string()),
            subtitles_enabled,
            audio_tracks,
            subtitle_tracks,
        };

        debug!(
            "Tracks refreshed: {} audio, {} subtitle",
            state.audio_tracks.len(),
            state.subtitle_tracks.len() - 1
        );

        self.locations = locations;
        self.publish(state.clone());
        state
    }

    /// Returns whether the selection was applied to the engine
    pub async fn select_audio_track(
        &mut self,
        engine: &dyn PlaybackEngine,
        track_id: &str,
    ) -> bool {
        let current = self.state();
        if !current.audio_tracks.iter().any(|t| t.id == track_id) {
            warn!("Audio track {} not found", track_id);
            return false;
        }
        let Some(location) = self.locations.get(track_id).copied() else {
            warn!("Audio track {} has no engine location", track_id);
            return false;
        };

        let mut params = engine.track_selection_parameters().await;
        params
            .set_track_type_disabled(TrackType::Audio, false)
            .set_override(TrackType::Audio, location);

        if let Err(e) = engine.set_track_selection_parameters(params).await {
            warn!("Failed to select audio track {}: {}", track_id, e);
            return false;
        }

        let mut state = current;
        for track in &mut state.audio_tracks {
            track.selected = track.id == track_id;
        }
        state.selected_audio_track_id = Some(track_id.to_string());
        info!("Selected audio track {}", track_id);
        self.publish(state);
        true
    }

    /// Select a subtitle track, or disable subtitles with `"off"`
    pub async fn select_subtitle_track(
        &mut self,
        engine: &dyn PlaybackEngine,
        track_id: &str,
    ) -> bool {
        let current = self.state();
        let turning_off = track_id == SUBTITLE_OFF_ID;

        let mut params = engine.track_selection_parameters().await;
        if turning_off {
            params
                .set_track_type_disabled(TrackType::Text, true)
                .clear_override(TrackType::Text);
        } else {
            if !current.subtitle_tracks.iter().any(|t| t.id == track_id) {
                warn!("Subtitle track {} not found", track_id);
                return false;
            }
            let Some(location) = self.locations.get(track_id).copied() else {
                warn!("Subtitle track {} has no engine location", track_id);
                return false;
            };
            params
                .set_track_type_disabled(TrackType::Text, false)
                .set_override(TrackType::Text, location);
        }

        if let Err(e) = engine.set_track_selection_parameters(params).await {
            warn!("Failed to select subtitle track {}: {}", track_id, e);
            return false;
        }

        let mut state = current;
        for track in &mut state.subtitle_tracks {
            track.selected = track.id == track_id;
        }
        state.selected_subtitle_track_id = track_id.to_string();
        state.subtitles_enabled = !turning_off;
        info!("Selected subtitle track {}", track_id);
        self.publish(state);
        true
    }

    /// Subtitles off if on, otherwise the first real subtitle track
    pub async fn toggle_subtitles(&mut self, engine: &dyn PlaybackEngine) -> bool {
        let current = self.state();
        if current.subtitles_enabled {
            return self.select_subtitle_track(engine, SUBTITLE_OFF_ID).await;
        }

        let Some(first) = current
            .subtitle_tracks
            .iter()
            .find(|t| t.kind != TrackKind::SubtitleOff)
        else {
            debug!("No subtitle tracks to enable");
            return false;
        };
        let first_id = first.id.clone();
        self.select_subtitle_track(engine, &first_id).await
    }
}

fn track_id(
    track_type: TrackType,
    format: &EngineTrackFormat,
    group_index: usize,
    track_index: usize,
    seen: &HashSet<String>,
) -> String {
    let positional = format!("{}-g{}t{}", track_type.tag(), group_index, track_index);
    match format.id.as_deref().filter(|id| !id.is_empty()) {
        Some(format_id) => {
            let id = format!("{}-{}", track_type.tag(), format_id);
            if seen.contains(&id) { positional } else { id }
        }
        None => positional,
    }
}

pub fn channel_label(channels: u32) -> String {
    match channels {
        1 => "Mono".to_string(),
        2 => "Stereo".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        n => format!("{}ch", n),
    }
}

fn audio_label(format: &EngineTrackFormat, number: usize) -> String {
    let mut segments = Vec::new();
    if let Some(language) = format.language.as_deref().filter(|l| !l.is_empty()) {
        segments.push(languages::display_name(language));
    }
    if let Some(channels) = format.channel_count.filter(|c| *c > 0) {
        segments.push(channel_label(channels));
    }
    if let Some(kbps) = format.bitrate.map(|b| b / 1000).filter(|k| *k > 0) {
        segments.push(format!("{}kbps", kbps));
    }

    if segments.is_empty() {
        fallback_label(format, number)
    } else {
        segments.join(" • ")
    }
}

fn subtitle_label(format: &EngineTrackFormat, number: usize) -> String {
    let name = match format.language.as_deref().filter(|l| !l.is_empty()) {
        Some(language) => languages::display_name(language),
        None => fallback_label(format, number),
    };
    if format.forced {
        format!("{} (Forced)", name)
    } else {
        name
    }
}

fn fallback_label(format: &EngineTrackFormat, number: usize) -> String {
    format
        .label
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| format!("Track {}", number))
}
