mod common;

use common::mocks::{FixedMonitor, RecordingEngine};
use common::{TestContext, movie_response};
use jellyplay::models::{MediaItemId, PlaybackDecision, PlaybackSource};
use jellyplay::player::{
    EngineEvent, EngineSlot, PlaybackSession, PlayerState, SessionHandle, SessionState,
};
use jellyplay::services::{FilePositionStore, PositionStore};
use mockito::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn start_session(
    slot: &EngineSlot,
    ctx: &TestContext,
    engine: RecordingEngine,
) -> SessionHandle {
    let lease = slot.claim().await.expect("Failed to claim engine slot");
    let (handle, session) = PlaybackSession::new(
        MediaItemId::new("movie-1"),
        Box::new(engine),
        lease,
        ctx.services.clone(),
        CancellationToken::new(),
    );
    tokio::spawn(session.run());
    handle
}

#[tokio::test]
async fn test_stream_release_and_resume() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/Users/test_user_id/Items/movie-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(movie_response().to_string())
        .expect(2)
        .create_async()
        .await;

    let ctx = TestContext::new(&server.url(), Arc::new(FixedMonitor::online()));
    let slot = EngineSlot::new();

    let engine = RecordingEngine::default();
    let handle = start_session(&slot, &ctx, engine.clone()).await;
    handle.initialize().await.expect("initialize failed");

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.item_name.as_deref(), Some("Test Movie"));
    assert_eq!(snapshot.source, Some(PlaybackSource::Stream));
    match snapshot.decision {
        Some(PlaybackDecision::Transcode { ref url, ref target, .. }) => {
            assert_eq!(target.max_bitrate, 4_000_000);
            assert!(url.starts_with(&format!("{}/Videos/movie-1/stream?", server.url())));
            assert!(url.contains("MaxStreamingBitrate=4000000"));
            assert!(url.ends_with("api_key=test_token"));
        }
        ref other => panic!("expected transcode, got {:?}", other),
    }

    let loaded = engine.last_load().expect("engine was not loaded");
    assert!(!loaded.is_local);
    assert_eq!(loaded.start_position, Duration::ZERO);
    assert_eq!(Some(loaded.uri.as_str()), snapshot.decision.as_ref().and_then(|d| d.url()));

    let tracks = handle.tracks();
    assert_eq!(tracks.audio_tracks.len(), 1);
    assert_eq!(tracks.subtitle_tracks.len(), 2);

    handle.play().await.expect("play failed");
    assert_eq!(handle.snapshot().state, SessionState::Playing);
    assert!(!slot.is_free());

    engine.set_position(Duration::from_secs(1800));
    handle.release().await.expect("release failed");

    assert_eq!(handle.snapshot().state, SessionState::Released);
    assert!(engine.is_released());
    assert!(slot.is_free());

    let positions = FilePositionStore::new(&ctx.positions_path);
    let stored = positions
        .load_position(&MediaItemId::new("movie-1"))
        .await
        .expect("Failed to read positions");
    assert_eq!(stored, Some(Duration::from_secs(1800)));

    let second = RecordingEngine::default();
    let handle = start_session(&slot, &ctx, second.clone()).await;
    handle.initialize().await.expect("second initialize failed");

    let loaded = second.last_load().expect("second engine was not loaded");
    assert_eq!(loaded.start_position, Duration::from_secs(1800));
    assert_eq!(handle.snapshot().position, Duration::from_secs(1800));

    handle.release().await.expect("second release failed");
}

#[tokio::test]
async fn test_offline_download_plays_without_metadata() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/Users/test_user_id/Items/movie-1")
        .with_status(503)
        .create_async()
        .await;

    let ctx = TestContext::new(&server.url(), Arc::new(FixedMonitor::offline()));
    let local_file = ctx.downloads_dir.join("movie-1.mkv");
    tokio::fs::write(&local_file, b"not really a movie")
        .await
        .expect("Failed to write download");

    let slot = EngineSlot::new();
    let engine = RecordingEngine::default();
    let handle = start_session(&slot, &ctx, engine.clone()).await;
    handle.initialize().await.expect("initialize failed");

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.source, Some(PlaybackSource::Local(local_file.clone())));
    assert_eq!(snapshot.item_name, None);
    assert_eq!(snapshot.decision, None);

    let loaded = engine.last_load().expect("engine was not loaded");
    assert!(loaded.is_local);
    assert_eq!(loaded.uri, local_file.to_string_lossy());

    // Quality menu only applies to streams
    assert!(handle.quality_options().await.unwrap().is_empty());

    handle.release().await.expect("release failed");
}

#[tokio::test]
async fn test_offline_without_download_fails() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/Users/test_user_id/Items/movie-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(movie_response().to_string())
        .create_async()
        .await;

    let ctx = TestContext::new(&server.url(), Arc::new(FixedMonitor::offline()));
    let slot = EngineSlot::new();
    let engine = RecordingEngine::default();
    let handle = start_session(&slot, &ctx, engine.clone()).await;

    assert!(handle.initialize().await.is_err());

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, SessionState::Error);
    let error = snapshot.error.expect("error not reported");
    assert!(error.retryable);
    assert!(engine.is_released());
    assert!(slot.is_free());
}

#[tokio::test]
async fn test_engine_state_events_drive_session() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/Users/test_user_id/Items/movie-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(movie_response().to_string())
        .create_async()
        .await;

    let ctx = TestContext::new(&server.url(), Arc::new(FixedMonitor::online()));
    let slot = EngineSlot::new();
    let engine = RecordingEngine::default();
    let handle = start_session(&slot, &ctx, engine.clone()).await;
    handle.initialize().await.expect("initialize failed");

    let mut updates = handle.subscribe();
    engine.emit(EngineEvent::StateChanged(PlayerState::Playing));
    updates
        .wait_for(|s| s.state == SessionState::Playing)
        .await
        .expect("session dropped");

    engine.emit(EngineEvent::Buffering(true));
    updates
        .wait_for(|s| s.is_buffering)
        .await
        .expect("session dropped");

    drop(updates);
    handle.release().await.expect("release failed");
    assert!(slot.is_free());
}
