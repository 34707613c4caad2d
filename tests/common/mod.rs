pub mod mocks;

use jellyplay::backends::JellyfinCatalog;
use jellyplay::config::Config;
use jellyplay::player::{PlaybackCapabilityAnalyzer, SessionServices};
use jellyplay::resilience::{CircuitBreaker, ResilientExecutor, RetryPolicy};
use jellyplay::services::{
    ConnectivityResolver, FileDownloadInventory, FilePositionStore, NetworkMonitor,
    StaticConnectionContext,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Real collaborators wired against a mock server and a scratch directory
pub struct TestContext {
    pub services: SessionServices,
    pub downloads_dir: std::path::PathBuf,
    pub positions_path: std::path::PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    pub fn new(server_url: &str, monitor: Arc<dyn NetworkMonitor>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let downloads_dir = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&downloads_dir).expect("Failed to create downloads dir");
        let positions_path = temp_dir.path().join("positions.json");

        let mut config = Config::default();
        config.server.base_url = server_url.to_string();
        config.server.access_token = Some("test_token".to_string());
        config.server.user_id = Some("test_user_id".to_string());
        config.playback.max_streaming_bitrate = 8_000_000;

        let context = Arc::new(StaticConnectionContext::from_config(&config.server));
        let catalog = JellyfinCatalog::from_context(context.as_ref(), &config.network)
            .expect("Failed to create catalog");
        let connectivity = ConnectivityResolver::new(
            monitor,
            Arc::new(FileDownloadInventory::new(&downloads_dir)),
            &config.network,
        );

        let services = SessionServices {
            catalog: Arc::new(catalog),
            connectivity: Arc::new(connectivity),
            analyzer: Arc::new(PlaybackCapabilityAnalyzer::new(config.playback.clone(), context)),
            positions: Arc::new(FilePositionStore::new(&positions_path)),
            executor: ResilientExecutor::new(
                RetryPolicy::new(10, 50),
                Arc::new(CircuitBreaker::new(5, Duration::from_secs(60))),
                3,
            ),
            config: config.playback,
        };

        Self {
            services,
            downloads_dir,
            positions_path,
            _temp_dir: temp_dir,
        }
    }
}

/// A 4K HEVC movie at 15 Mbps
pub fn movie_response() -> serde_json::Value {
    json!({
        "Id": "movie-1",
        "Name": "Test Movie",
        "RunTimeTicks": 72000000000i64,
        "MediaSources": [
            {
                "Id": "source-1",
                "Container": "mkv",
                "Bitrate": 15000000,
                "MediaStreams": [
                    { "Type": "Video", "Index": 0, "Codec": "hevc", "Width": 3840, "Height": 2160 },
                    { "Type": "Audio", "Index": 1, "Codec": "eac3", "Language": "eng", "Channels": 6 },
                    { "Type": "Subtitle", "Index": 3, "Codec": "srt", "Language": "spa" }
                ]
            }
        ]
    })
}
