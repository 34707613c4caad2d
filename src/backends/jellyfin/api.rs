use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backends::traits::MediaCatalog;
use crate::config::NetworkConfig;
use crate::models::{
    MediaItem, MediaItemId, MediaSourceId, MediaSourceProfile, MediaStream, MediaStreamKind,
    Resolution, UserId,
};
use crate::resilience::ApiError;
use crate::services::ConnectionContext;

const JELLYFIN_CLIENT_NAME: &str = "Jellyplay";
const JELLYFIN_VERSION: &str = env!("CARGO_PKG_VERSION");
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Item metadata client for a Jellyfin server.
#[derive(Clone)]
pub struct JellyfinCatalog {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    user_id: UserId,
    device_id: String,
}

impl JellyfinCatalog {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        user_id: UserId,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            user_id,
            device_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn from_context(context: &dyn ConnectionContext, network: &NetworkConfig) -> Result<Self> {
        let base_url = context.server_base().context("No server configured")?;
        let api_key = context.access_token().context("No access token configured")?;
        let user_id = context.user_id().context("No user id configured")?;
        Self::new(
            base_url,
            api_key,
            user_id,
            Duration::from_secs(network.connection_timeout),
        )
    }

    fn get_auth_header(&self) -> String {
        format!(
            r#"MediaBrowser Client="{}", Device="Linux", DeviceId="{}", Version="{}", Token="{}""#,
            JELLYFIN_CLIENT_NAME, self.device_id, JELLYFIN_VERSION, self.api_key
        )
    }
}

#[async_trait]
impl MediaCatalog for JellyfinCatalog {
    async fn get_item(&self, item_id: &MediaItemId) -> Result<MediaItem, ApiError> {
        let url = format!(
            "{}/Users/{}/Items/{}",
            self.base_url, self.user_id, item_id
        );
        debug!("Fetching item {}", item_id);

        let response = self
            .client
            .get(&url)
            .header("X-Emby-Authorization", self.get_auth_header())
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!("Item request for {} failed: {}", item_id, status);

            return Err(match ApiError::from_status(status.as_u16(), body) {
                ApiError::RateLimited { message, .. } => ApiError::RateLimited {
                    message,
                    retry_after,
                },
                other => other,
            });
        }

        let item: JellyfinItem = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(format!("Invalid item response: {}", e)))?;

        Ok(item.into_media_item())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JellyfinItem {
    id: String,
    name: String,
    run_time_ticks: Option<u64>,
    #[serde(default)]
    media_sources: Vec<JellyfinMediaSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JellyfinMediaSource {
    id: String,
    container: Option<String>,
    bitrate: Option<u64>,
    direct_stream_url: Option<String>,
    #[serde(default)]
    media_streams: Vec<JellyfinMediaStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JellyfinMediaStream {
    #[serde(rename = "Type")]
    stream_type: String,
    #[serde(default)]
    index: u32,
    codec: Option<String>,
    language: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    is_forced: bool,
    #[serde(default)]
    is_default: bool,
}

impl JellyfinItem {
    fn into_media_item(self) -> MediaItem {
        MediaItem {
            id: MediaItemId::new(self.id),
            name: self.name,
            run_time: self
                .run_time_ticks
                .map(|ticks| {
                    Duration::from_nanos(ticks.saturating_mul(1_000_000_000 / TICKS_PER_SECOND))
                }),
            media_sources: self
                .media_sources
                .into_iter()
                .map(JellyfinMediaSource::into_profile)
                .collect(),
        }
    }
}

impl JellyfinMediaSource {
    fn into_profile(self) -> MediaSourceProfile {
        let video = self
            .media_streams
            .iter()
            .find(|s| s.stream_type == "Video");
        let audio = self
            .media_streams
            .iter()
            .filter(|s| s.stream_type == "Audio")
            .max_by_key(|s| s.is_default);

        let resolution = video.and_then(|v| match (v.width, v.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Resolution::new(w, h)),
            _ => None,
        });

        MediaSourceProfile {
            id: MediaSourceId::new(self.id),
            container: self.container,
            video_codec: video.and_then(|v| v.codec.clone()),
            audio_codec: audio.and_then(|a| a.codec.clone()),
            bitrate: self.bitrate,
            resolution,
            bandwidth_ceiling: None,
            direct_stream_path: self.direct_stream_url,
            streams: self
                .media_streams
                .iter()
                .filter_map(JellyfinMediaStream::to_stream)
                .collect(),
        }
    }
}

impl JellyfinMediaStream {
    fn to_stream(&self) -> Option<MediaStream> {
        let kind = match self.stream_type.as_str() {
            "Video" => MediaStreamKind::Video,
            "Audio" => MediaStreamKind::Audio,
            "Subtitle" => MediaStreamKind::Subtitle,
            _ => return None,
        };
        Some(MediaStream {
            index: self.index,
            kind,
            codec: self.codec.clone(),
            language: self.language.clone(),
            channels: self.channels,
            bitrate: self.bit_rate,
            is_forced: self.is_forced,
            is_default: self.is_default,
        })
    }
}
