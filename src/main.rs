use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jellyplay::backends::{JellyfinCatalog, MediaCatalog};
use jellyplay::config::Config;
use jellyplay::models::{MediaItemId, PlaybackDecision};
use jellyplay::player::{PlaybackCapabilityAnalyzer, QualityTier};
use jellyplay::resilience::ResilientExecutor;
use jellyplay::services::{DownloadInventory, FileDownloadInventory, StaticConnectionContext};

#[derive(Parser, Debug)]
#[command(name = "jellyplay")]
#[command(about = "Show how a Jellyfin item would be played")]
struct Args {
    /// Jellyfin item id
    item_id: String,

    /// Per-session bitrate ceiling in bits per second
    #[arg(long)]
    max_bitrate: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jellyplay=debug")),
        )
        .init();

    let args = Args::parse();
    let item_id = MediaItemId::new(args.item_id);
    let config = Config::load()?;
    info!("Resolving playback for {}", item_id);

    let downloads = FileDownloadInventory::default_location()?;
    if let Some(path) = downloads.local_path(&item_id).await {
        println!("Local: {}", path.display());
        return Ok(());
    }

    let context = Arc::new(StaticConnectionContext::from_config(&config.server));
    let catalog = JellyfinCatalog::from_context(context.as_ref(), &config.network)?;
    let executor = ResilientExecutor::from_config(&config.network);

    let item = executor
        .with_retry_and_circuit_breaker("items", executor.default_attempts(), || {
            catalog.get_item(&item_id)
        })
        .await
        .with_context(|| format!("Failed to fetch item {}", item_id))?;

    let analyzer = PlaybackCapabilityAnalyzer::new(config.playback.clone(), context);
    let decision = analyzer.decide_with_ceiling(&item, args.max_bitrate);

    println!("{}", item.name);
    match &decision {
        PlaybackDecision::DirectPlay { url, source, reason } => {
            let tier = source.bitrate.map(QualityTier::from_bitrate);
            println!("Direct play ({})", reason);
            if let Some(tier) = tier {
                println!("Quality: {}", tier);
            }
            println!("{}", url);
        }
        PlaybackDecision::Transcode {
            url,
            target,
            reason,
        } => {
            println!("Transcode ({})", reason);
            println!(
                "Target: {} {}/{} in {} at {} bps",
                target.max_resolution,
                target.video_codec,
                target.audio_codec,
                target.container,
                target.max_bitrate
            );
            println!("{}", url);
        }
        PlaybackDecision::Unavailable { message } => bail!("Unavailable: {}", message),
    }

    println!("Qualities:");
    for option in analyzer.quality_options(&item) {
        println!("  {}", option.name);
    }

    Ok(())
}
