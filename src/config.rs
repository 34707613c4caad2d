use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_containers")]
    pub direct_play_containers: Vec<String>,

    #[serde(default = "default_video_codecs")]
    pub direct_play_video_codecs: Vec<String>,

    #[serde(default = "default_audio_codecs")]
    pub direct_play_audio_codecs: Vec<String>,

    /// Negotiated bandwidth ceiling in bits per second
    #[serde(default = "default_max_bitrate")]
    pub max_streaming_bitrate: u64,

    #[serde(default = "default_ladder")]
    pub quality_ladder: Vec<LadderRung>,

    /// Fraction of the runtime after which an item counts as finished
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f64,

    #[serde(default = "default_position_interval")]
    pub position_update_interval_ms: u64,
}

/// One step of the transcode quality ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderRung {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub connection_timeout: u64,

    /// Total attempts per network operation, including the first
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: u32,

    #[serde(default = "default_open_timeout")]
    pub circuit_open_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub allow_cellular_streaming: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        info!("Config loaded successfully");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("jellyplay").join("config.toml"))
    }
}

impl NetworkConfig {
    pub fn circuit_open_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_open_timeout_secs)
    }
}

impl PlaybackConfig {
    pub fn position_update_interval(&self) -> Duration {
        Duration::from_millis(self.position_update_interval_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            direct_play_containers: default_containers(),
            direct_play_video_codecs: default_video_codecs(),
            direct_play_audio_codecs: default_audio_codecs(),
            max_streaming_bitrate: default_max_bitrate(),
            quality_ladder: default_ladder(),
            completion_threshold: default_completion_threshold(),
            position_update_interval_ms: default_position_interval(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connection_timeout: default_timeout(),
            max_attempts: default_attempts(),
            retry_base_delay_ms: default_base_delay(),
            retry_max_delay_ms: default_max_delay(),
            circuit_failure_threshold: default_failure_threshold(),
            circuit_open_timeout_secs: default_open_timeout(),
            allow_cellular_streaming: default_true(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// Default value functions
fn default_containers() -> Vec<String> {
    strings(&["mp4", "m4v", "mkv", "matroska", "webm", "mov"])
}
fn default_video_codecs() -> Vec<String> {
    strings(&["h264", "hevc", "vp8", "vp9", "av1"])
}
fn default_audio_codecs() -> Vec<String> {
    strings(&["aac", "mp3", "opus", "flac", "vorbis"])
}
fn default_max_bitrate() -> u64 {
    20_000_000
}
fn default_ladder() -> Vec<LadderRung> {
    [
        ("1080p", 1920, 1080, 8_000_000),
        ("720p", 1280, 720, 4_000_000),
        ("480p", 854, 480, 2_000_000),
        ("360p", 640, 360, 1_000_000),
    ]
    .into_iter()
    .map(|(name, width, height, bitrate)| LadderRung {
        name: name.to_string(),
        width,
        height,
        bitrate,
    })
    .collect()
}
fn default_completion_threshold() -> f64 {
    0.9
}
fn default_position_interval() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}
fn default_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    10_000
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_open_timeout() -> u64 {
    60
}
