mod identifiers;

pub use identifiers::{MediaItemId, MediaSourceId, SessionId, UserId};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A catalog entry as far as playback is concerned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaItemId,
    pub name: String,
    pub run_time: Option<Duration>,
    /// The first source is the primary one.
    pub media_sources: Vec<MediaSourceProfile>,
}

impl MediaItem {
    pub fn primary_source(&self) -> Option<&MediaSourceProfile> {
        self.media_sources.first()
    }
}

/// Container/codec/bitrate description of one playable file of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSourceProfile {
    pub id: MediaSourceId,
    pub container: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Total bitrate in bits per second
    pub bitrate: Option<u64>,
    pub resolution: Option<Resolution>,
    /// Upper bound the server is willing to stream this source at, in bps
    pub bandwidth_ceiling: Option<u64>,
    /// Server-issued direct stream path (relative or absolute)
    pub direct_stream_path: Option<String>,
    #[serde(default)]
    pub streams: Vec<MediaStream>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaStreamKind {
    Video,
    Audio,
    Subtitle,
}

/// Entry of the audio/subtitle manifest attached to a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub index: u32,
    pub kind: MediaStreamKind,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub channels: Option<u32>,
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub is_forced: bool,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output profile requested from the server when transcoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeProfile {
    pub video_codec: String,
    pub audio_codec: String,
    pub container: String,
    pub max_bitrate: u64,
    pub max_resolution: Resolution,
}

/// One entry of a manual quality menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    pub name: String,
    pub resolution: Resolution,
    pub bitrate: u64,
    pub requires_transcode: bool,
}

/// Outcome of a single playback attempt's capability analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackDecision {
    DirectPlay {
        url: String,
        source: MediaSourceProfile,
        reason: String,
    },
    Transcode {
        url: String,
        target: TranscodeProfile,
        reason: String,
    },
    Unavailable {
        message: String,
    },
}

impl PlaybackDecision {
    pub fn url(&self) -> Option<&str> {
        match self {
            PlaybackDecision::DirectPlay { url, .. } | PlaybackDecision::Transcode { url, .. } => {
                Some(url)
            }
            PlaybackDecision::Unavailable { .. } => None,
        }
    }

    pub fn is_direct_play(&self) -> bool {
        matches!(self, PlaybackDecision::DirectPlay { .. })
    }

    /// Justification string, or the failure message for `Unavailable`.
    pub fn reason(&self) -> &str {
        match self {
            PlaybackDecision::DirectPlay { reason, .. }
            | PlaybackDecision::Transcode { reason, .. } => reason,
            PlaybackDecision::Unavailable { message } => message,
        }
    }
}

/// Where a session should read its media from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackSource {
    Local(PathBuf),
    Stream,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NetworkType {
    #[default]
    None,
    WiFi,
    Cellular,
    Ethernet,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineStorageInfo {
    pub total_bytes: u64,
    pub item_count: usize,
    pub formatted_size: String,
}
