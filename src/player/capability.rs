use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{LadderRung, PlaybackConfig};
use crate::models::{
    MediaItem, MediaSourceProfile, PlaybackDecision, QualityOption, Resolution, TranscodeProfile,
};
use crate::services::ConnectionContext;

const TRANSCODE_VIDEO_CODEC: &str = "h264";
const TRANSCODE_AUDIO_CODEC: &str = "aac";
const TRANSCODE_CONTAINER: &str = "mp4";

/// Coarse quality bucket used for labelling sources and menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityTier {
    VeryLow,
    Low,
    Medium,
    High,
    UltraHigh,
}

impl QualityTier {
    pub fn from_bitrate(bps: u64) -> Self {
        match bps {
            b if b >= 20_000_000 => QualityTier::UltraHigh,
            b if b >= 10_000_000 => QualityTier::High,
            b if b >= 5_000_000 => QualityTier::Medium,
            b if b >= 2_000_000 => QualityTier::Low,
            _ => QualityTier::VeryLow,
        }
    }

    pub fn from_resolution(resolution: Resolution) -> Self {
        match resolution.height {
            h if h >= 2160 => QualityTier::UltraHigh,
            h if h >= 1080 => QualityTier::High,
            h if h >= 720 => QualityTier::Medium,
            h if h >= 480 => QualityTier::Low,
            _ => QualityTier::VeryLow,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::UltraHigh => "4K/Ultra High",
            QualityTier::High => "1080p/High",
            QualityTier::Medium => "720p/Medium",
            QualityTier::Low => "480p/Low",
            QualityTier::VeryLow => "Audio/Very Low",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a source cannot be played as-is
#[derive(Debug, Clone, PartialEq)]
enum Incompatibility {
    Container(String),
    VideoCodec(String),
    AudioCodec(String),
    Bitrate { bitrate: u64, ceiling: u64 },
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incompatibility::Container(c) => write!(f, "Unsupported container {}", c),
            Incompatibility::VideoCodec(c) => write!(f, "Unsupported video codec {}", c),
            Incompatibility::AudioCodec(c) => write!(f, "Unsupported audio codec {}", c),
            Incompatibility::Bitrate { bitrate, ceiling } => write!(
                f,
                "Bitrate {} exceeds limit {}",
                format_mbps(*bitrate),
                format_mbps(*ceiling)
            ),
        }
    }
}

/// Decides between direct play and server-side transcoding.
///
/// Never fails: any gap in metadata or connection details becomes
/// `PlaybackDecision::Unavailable`.
pub struct PlaybackCapabilityAnalyzer {
    profile: PlaybackConfig,
    context: Arc<dyn ConnectionContext>,
}

impl PlaybackCapabilityAnalyzer {
    pub fn new(profile: PlaybackConfig, context: Arc<dyn ConnectionContext>) -> Self {
        Self { profile, context }
    }

    pub fn decide(&self, item: &MediaItem) -> PlaybackDecision {
        self.decide_with_ceiling(item, None)
    }

    /// Same as `decide`, with an extra per-session bitrate cap
    pub fn decide_with_ceiling(
        &self,
        item: &MediaItem,
        bitrate_override: Option<u64>,
    ) -> PlaybackDecision {
        let Some(source) = item.primary_source() else {
            warn!("Item {} has no media sources", item.id);
            return PlaybackDecision::Unavailable {
                message: format!("{} has no playable media sources", item.name),
            };
        };

        let (Some(base), Some(token)) = (self.context.server_base(), self.context.access_token())
        else {
            warn!("No server connection available for item {}", item.id);
            return PlaybackDecision::Unavailable {
                message: "Not connected to a server".to_string(),
            };
        };

        let ceiling = self.effective_ceiling(source, bitrate_override);

        match self.check_direct_play(source, ceiling) {
            Ok(()) => {
                let Some(url) = direct_stream_url(&base, &token, item, source) else {
                    return PlaybackDecision::Unavailable {
                        message: format!("Invalid server address {}", base),
                    };
                };
                let reason = format!(
                    "{} with {}/{} plays natively at {}",
                    source.container.as_deref().unwrap_or("source"),
                    source.video_codec.as_deref().unwrap_or("unknown"),
                    source.audio_codec.as_deref().unwrap_or("no audio"),
                    source.bitrate.map(format_mbps).unwrap_or_else(|| "unknown bitrate".into())
                );
                info!("Direct play for {}: {}", item.id, reason);
                PlaybackDecision::DirectPlay {
                    url,
                    source: source.clone(),
                    reason,
                }
            }
            Err(incompatibility) => {
                let Some(target) = self.transcode_target(source, ceiling) else {
                    return PlaybackDecision::Unavailable {
                        message: "No transcode quality levels configured".to_string(),
                    };
                };
                let Some(url) = transcode_url(&base, &token, item, &target) else {
                    return PlaybackDecision::Unavailable {
                        message: format!("Invalid server address {}", base),
                    };
                };
                let reason = incompatibility.to_string();
                info!(
                    "Transcoding {} to {} at {}: {}",
                    item.id,
                    target.max_resolution,
                    format_mbps(target.max_bitrate),
                    reason
                );
                PlaybackDecision::Transcode {
                    url,
                    target,
                    reason,
                }
            }
        }
    }

    /// Minimum of the device ceiling, the source's ceiling and the override
    pub fn effective_ceiling(
        &self,
        source: &MediaSourceProfile,
        bitrate_override: Option<u64>,
    ) -> u64 {
        [
            Some(self.profile.max_streaming_bitrate),
            source.bandwidth_ceiling,
            bitrate_override,
        ]
        .into_iter()
        .flatten()
        .filter(|b| *b > 0)
        .min()
        .unwrap_or(self.profile.max_streaming_bitrate)
    }

    fn check_direct_play(
        &self,
        source: &MediaSourceProfile,
        ceiling: u64,
    ) -> Result<(), Incompatibility> {
        let container = source.container.as_deref().unwrap_or_default();
        if !container_supported(container, &self.profile.direct_play_containers) {
            return Err(Incompatibility::Container(describe(container)));
        }

        let video = source.video_codec.as_deref().unwrap_or_default();
        if !contains_ignore_case(&self.profile.direct_play_video_codecs, video) {
            return Err(Incompatibility::VideoCodec(describe(video)));
        }

        // Sources without an audio stream have nothing to decode
        if let Some(audio) = source.audio_codec.as_deref() {
            if !contains_ignore_case(&self.profile.direct_play_audio_codecs, audio) {
                return Err(Incompatibility::AudioCodec(audio.to_string()));
            }
        }

        match source.bitrate {
            Some(bitrate) if bitrate > ceiling => {
                Err(Incompatibility::Bitrate { bitrate, ceiling })
            }
            _ => Ok(()),
        }
    }

    /// Highest rung strictly below the ceiling and not above the source
    fn transcode_target(
        &self,
        source: &MediaSourceProfile,
        ceiling: u64,
    ) -> Option<TranscodeProfile> {
        let mut ladder: Vec<&LadderRung> = self.profile.quality_ladder.iter().collect();
        ladder.sort_by(|a, b| b.bitrate.cmp(&a.bitrate));

        let rung = ladder
            .iter()
            .find(|rung| {
                rung.bitrate < ceiling && source.bitrate.is_none_or(|b| rung.bitrate <= b)
            })
            // Nothing fits: lowest rung's size, clamped to the ceiling below
            .or_else(|| ladder.last())?;

        debug!("Selected ladder rung {} for ceiling {}", rung.name, ceiling);

        let mut resolution = Resolution::new(rung.width, rung.height);
        if let Some(src) = source.resolution.filter(|r| r.width > 0 && r.height > 0) {
            resolution.width = resolution.width.min(src.width);
            resolution.height = resolution.height.min(src.height);
        }

        Some(TranscodeProfile {
            video_codec: TRANSCODE_VIDEO_CODEC.to_string(),
            audio_codec: TRANSCODE_AUDIO_CODEC.to_string(),
            container: TRANSCODE_CONTAINER.to_string(),
            max_bitrate: rung.bitrate.min(ceiling),
            max_resolution: resolution,
        })
    }

    /// Original quality plus every ladder rung that does not exceed the source
    pub fn quality_options(&self, item: &MediaItem) -> Vec<QualityOption> {
        let Some(source) = item.primary_source() else {
            return Vec::new();
        };

        let source_resolution = source.resolution.unwrap_or_default();
        let source_bitrate = source.bitrate.unwrap_or_default();
        let tier = match source.resolution {
            Some(r) if r.height > 0 => QualityTier::from_resolution(r),
            _ => QualityTier::from_bitrate(source_bitrate),
        };

        let mut options = vec![QualityOption {
            name: format!("Original ({})", tier),
            resolution: source_resolution,
            bitrate: source_bitrate,
            requires_transcode: false,
        }];

        options.extend(
            self.profile
                .quality_ladder
                .iter()
                .filter(|rung| source_bitrate == 0 || rung.bitrate <= source_bitrate)
                .filter(|rung| {
                    source_resolution.height == 0 || rung.height <= source_resolution.height
                })
                .map(|rung| QualityOption {
                    name: format!("{} ({})", rung.name, format_mbps(rung.bitrate)),
                    resolution: Resolution::new(rung.width, rung.height),
                    bitrate: rung.bitrate,
                    requires_transcode: true,
                }),
        );

        options
    }
}

fn direct_stream_url(
    base: &str,
    token: &str,
    item: &MediaItem,
    source: &MediaSourceProfile,
) -> Option<String> {
    let url = match source.direct_stream_path.as_deref() {
        Some(path) if path.starts_with("http") => Url::parse(path).ok()?,
        Some(path) if path.starts_with('/') => Url::parse(&format!("{}{}", base, path)).ok()?,
        Some(path) if !path.is_empty() => Url::parse(&format!("{}/{}", base, path)).ok()?,
        _ => {
            let mut url = stream_endpoint(base, item)?;
            url.query_pairs_mut()
                .append_pair("Static", "true")
                .append_pair("mediaSourceId", source.id.as_str())
                .append_pair("api_key", token);
            url
        }
    };
    Some(url.into())
}

/// `{base}/Videos/{id}/stream`, keeping any path prefix of the base
fn stream_endpoint(base: &str, item: &MediaItem) -> Option<Url> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["Videos", item.id.as_str(), "stream"]);
    Some(url)
}

fn transcode_url(
    base: &str,
    token: &str,
    item: &MediaItem,
    target: &TranscodeProfile,
) -> Option<String> {
    let mut url = stream_endpoint(base, item)?;
    url.query_pairs_mut()
        .append_pair("MaxStreamingBitrate", &target.max_bitrate.to_string())
        .append_pair("VideoCodec", &target.video_codec)
        .append_pair("AudioCodec", &target.audio_codec)
        .append_pair("MaxWidth", &target.max_resolution.width.to_string())
        .append_pair("MaxHeight", &target.max_resolution.height.to_string())
        .append_pair("api_key", token);
    Some(url.to_string())
}

/// Jellyfin reports containers as comma lists such as `mov,mp4,m4a`
fn container_supported(container: &str, supported: &[String]) -> bool {
    container
        .split(',')
        .map(str::trim)
        .any(|c| !c.is_empty() && contains_ignore_case(supported, c))
}

fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    values.iter().any(|v| v.eq_ignore_ascii_case(needle))
}

fn describe(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}

fn format_mbps(bps: u64) -> String {
    format!("{:.1} Mbps", bps as f64 / 1_000_000.0)
}
