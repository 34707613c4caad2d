use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::capability::PlaybackCapabilityAnalyzer;
use super::slot::EngineLease;
use super::tracks::{TrackSelectionState, TrackSelector};
use super::traits::PlaybackEngine;
use super::types::{EngineEvent, MediaReference, PlayerState};
use crate::backends::MediaCatalog;
use crate::config::PlaybackConfig;
use crate::models::{
    MediaItem, MediaItemId, PlaybackDecision, PlaybackSource, QualityOption, Resolution,
    SessionId,
};
use crate::resilience::{ApiError, ResilientExecutor};
use crate::services::{ConnectivityResolver, PositionStore};

/// Breaker key for catalog lookups
const ITEMS_OPERATION: &str = "items";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Playing,
    Paused,
    Released,
    /// Initialization failed; terminal
    Error,
}

impl SessionState {
    fn has_media(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Playing | SessionState::Paused
        )
    }
}

/// User-facing failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionError {
    pub message: String,
    pub retryable: bool,
}

impl SessionError {
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            retryable,
        }
    }
}

impl From<&ApiError> for SessionError {
    fn from(error: &ApiError) -> Self {
        let message = match error {
            ApiError::Authentication { .. } => "Sign in again to continue".to_string(),
            ApiError::NotFound(_) => "This item is no longer available on the server".to_string(),
            ApiError::ServiceUnavailable { .. } => {
                "The server is not responding, try again shortly".to_string()
            }
            other => other.to_string(),
        };
        let retryable =
            error.is_retryable() || matches!(error, ApiError::ServiceUnavailable { .. });
        Self::new(message, retryable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastTarget {
    pub device_id: String,
    pub device_name: String,
}

/// Everything a rendering surface needs, replaced wholesale on every change
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub item_id: MediaItemId,
    pub state: SessionState,
    pub item_name: Option<String>,
    pub decision: Option<PlaybackDecision>,
    pub source: Option<PlaybackSource>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub buffered_percentage: Option<f64>,
    pub is_buffering: bool,
    pub video_size: Option<Resolution>,
    pub cast_target: Option<CastTarget>,
    pub bitrate_override: Option<u64>,
    pub error: Option<SessionError>,
}

impl SessionSnapshot {
    fn new(session_id: SessionId, item_id: MediaItemId) -> Self {
        Self {
            session_id,
            item_id,
            state: SessionState::Uninitialized,
            item_name: None,
            decision: None,
            source: None,
            position: Duration::ZERO,
            duration: None,
            buffered_percentage: None,
            is_buffering: false,
            video_size: None,
            cast_target: None,
            bitrate_override: None,
            error: None,
        }
    }
}

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionServices {
    pub catalog: Arc<dyn MediaCatalog>,
    pub connectivity: Arc<ConnectivityResolver>,
    pub analyzer: Arc<PlaybackCapabilityAnalyzer>,
    pub positions: Arc<dyn PositionStore>,
    pub executor: ResilientExecutor,
    pub config: PlaybackConfig,
}

/// Commands that can be sent to a playback session
#[derive(Debug)]
pub enum SessionCommand {
    Initialize {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Play {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Pause {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Seek {
        position: Duration,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// `None` clears a previous override
    ChangeQuality {
        max_bitrate: Option<u64>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    GetQualityOptions {
        respond_to: oneshot::Sender<Vec<QualityOption>>,
    },
    StartCast {
        target: CastTarget,
        respond_to: oneshot::Sender<Result<()>>,
    },
    StopCast {
        respond_to: oneshot::Sender<Result<()>>,
    },
    SelectAudioTrack {
        track_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    SelectSubtitleTrack {
        track_id: String,
        respond_to: oneshot::Sender<bool>,
    },
    ToggleSubtitles {
        respond_to: oneshot::Sender<bool>,
    },
    DismissError,
    Release {
        respond_to: oneshot::Sender<()>,
    },
}

struct PositionLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Actor that owns the engine and the published snapshot of one session
pub struct PlaybackSession {
    item_id: MediaItemId,
    engine: Box<dyn PlaybackEngine>,
    lease: Option<EngineLease>,
    services: SessionServices,
    scope: CancellationToken,

    commands: mpsc::UnboundedReceiver<SessionCommand>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    tick_tx: mpsc::UnboundedSender<()>,
    ticks: mpsc::UnboundedReceiver<()>,

    snapshot: SessionSnapshot,
    state_tx: watch::Sender<SessionSnapshot>,
    tracks: TrackSelector,

    item: Option<MediaItem>,
    media: Option<MediaReference>,
    position_loop: Option<PositionLoop>,
    released: bool,
}

impl PlaybackSession {
    /// Build a session and its handle; run it with `tokio::spawn(session.run())`.
    ///
    /// The session shuts down when `scope` is cancelled or every handle is
    /// dropped, releasing the engine either way.
    pub fn new(
        item_id: MediaItemId,
        engine: Box<dyn PlaybackEngine>,
        lease: EngineLease,
        services: SessionServices,
        scope: CancellationToken,
    ) -> (SessionHandle, PlaybackSession) {
        let session_id = SessionId::generate();
        let (sender, commands) = mpsc::unbounded_channel();
        let (event_tx, engine_events) = mpsc::unbounded_channel();
        let (tick_tx, ticks) = mpsc::unbounded_channel();

        let snapshot = SessionSnapshot::new(session_id.clone(), item_id.clone());
        let (state_tx, state_rx) = watch::channel(snapshot.clone());
        let tracks = TrackSelector::new();
        let tracks_rx = tracks.subscribe();

        engine.set_event_sink(event_tx);

        let session = PlaybackSession {
            item_id,
            engine,
            lease: Some(lease),
            services,
            scope,
            commands,
            engine_events,
            tick_tx,
            ticks,
            snapshot,
            state_tx,
            tracks,
            item: None,
            media: None,
            position_loop: None,
            released: false,
        };
        let handle = SessionHandle {
            session_id,
            sender,
            state_rx,
            tracks_rx,
        };

        (handle, session)
    }

    /// Run the session event loop
    pub async fn run(mut self) {
        debug!("Playback session {} started", self.snapshot.session_id);

        loop {
            tokio::select! {
                biased;
                _ = self.scope.cancelled() => {
                    info!("Session scope cancelled, tearing down {}", self.snapshot.session_id);
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Release { respond_to }) => {
                        self.release().await;
                        let _ = respond_to.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All handles dropped for {}", self.snapshot.session_id);
                        break;
                    }
                },
                Some(event) = self.engine_events.recv() => self.handle_engine_event(event).await,
                Some(()) = self.ticks.recv() => self.refresh_progress().await,
            }
        }

        self.release().await;
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Initialize { respond_to } => {
                let result = self.initialize().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Play { respond_to } => {
                let result = self.play().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Pause { respond_to } => {
                let result = self.pause().await;
                let _ = respond_to.send(result);
            }
            SessionCommand::Seek {
                position,
                respond_to,
            } => {
                let result = self.seek(position).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::ChangeQuality {
                max_bitrate,
                respond_to,
            } => {
                let result = self.change_quality(max_bitrate).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::GetQualityOptions { respond_to } => {
                let options = match (&self.item, &self.snapshot.source) {
                    (Some(item), Some(PlaybackSource::Stream)) => {
                        self.services.analyzer.quality_options(item)
                    }
                    _ => Vec::new(),
                };
                let _ = respond_to.send(options);
            }
            SessionCommand::StartCast { target, respond_to } => {
                let result = self.start_cast(target).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::StopCast { respond_to } => {
                let result = self.stop_cast();
                let _ = respond_to.send(result);
            }
            SessionCommand::SelectAudioTrack {
                track_id,
                respond_to,
            } => {
                let selected = self.snapshot.state.has_media()
                    && self
                        .tracks
                        .select_audio_track(self.engine.as_ref(), &track_id)
                        .await;
                let _ = respond_to.send(selected);
            }
            SessionCommand::SelectSubtitleTrack {
                track_id,
                respond_to,
            } => {
                let selected = self.snapshot.state.has_media()
                    && self
                        .tracks
                        .select_subtitle_track(self.engine.as_ref(), &track_id)
                        .await;
                let _ = respond_to.send(selected);
            }
            SessionCommand::ToggleSubtitles { respond_to } => {
                let toggled = self.snapshot.state.has_media()
                    && self.tracks.toggle_subtitles(self.engine.as_ref()).await;
                let _ = respond_to.send(toggled);
            }
            SessionCommand::DismissError => {
                if self.snapshot.state != SessionState::Error
                    && self.snapshot.error.take().is_some()
                {
                    self.publish();
                }
            }
            SessionCommand::Release { respond_to } => {
                // Handled by the run loop; kept for exhaustiveness
                self.release().await;
                let _ = respond_to.send(());
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot.clone());
    }

    fn set_state(&mut self, state: SessionState) {
        if self.snapshot.state != state {
            debug!(
                "Session {} state {:?} -> {:?}",
                self.snapshot.session_id, self.snapshot.state, state
            );
            self.snapshot.state = state;
        }
        self.publish();
    }

    /// Error field only; the primary state is left alone
    fn report_error(&mut self, error: SessionError) {
        warn!("Playback error in {}: {}", self.snapshot.session_id, error.message);
        self.snapshot.error = Some(error);
        self.publish();
    }

    fn require_media(&self, action: &str) -> Result<()> {
        if self.snapshot.state.has_media() {
            Ok(())
        } else {
            Err(anyhow!(
                "Cannot {} while session is {:?}",
                action,
                self.snapshot.state
            ))
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.snapshot.state != SessionState::Uninitialized {
            return Err(anyhow!(
                "Session already initialized ({:?})",
                self.snapshot.state
            ));
        }
        self.set_state(SessionState::Initializing);

        let scope = self.scope.clone();
        let prepared = tokio::select! {
            biased;
            _ = scope.cancelled() => Err(cancelled()),
            prepared = self.prepare_media() => prepared,
        };

        match prepared {
            Ok(()) => {
                self.snapshot.error = None;
                self.refresh_tracks().await;
                self.start_position_loop();
                self.set_state(SessionState::Ready);
                info!("Session {} ready", self.snapshot.session_id);
                Ok(())
            }
            Err(failure) => {
                error!(
                    "Session {} failed to initialize: {}",
                    self.snapshot.session_id, failure.message
                );
                let message = failure.message.clone();
                self.snapshot.error = Some(failure);
                self.set_state(SessionState::Error);
                self.free_engine().await;
                Err(anyhow!(message))
            }
        }
    }

    /// Resolve source, fetch metadata, decide and load, in that order
    async fn prepare_media(&mut self) -> Result<(), SessionError> {
        let source = self
            .services
            .connectivity
            .suggest_playback_source(&self.item_id)
            .await;
        self.snapshot.source = Some(source.clone());

        let item = match &source {
            PlaybackSource::Local(_) => self.fetch_local_metadata().await,
            PlaybackSource::Stream => {
                let catalog = self.services.catalog.clone();
                let item_id = self.item_id.clone();
                let fetched = self
                    .services
                    .executor
                    .with_retry_and_circuit_breaker(
                        ITEMS_OPERATION,
                        self.services.executor.default_attempts(),
                        || catalog.get_item(&item_id),
                    )
                    .await;
                match fetched {
                    Ok(item) => Some(item),
                    Err(e) if e.is_cancelled() => return Err(cancelled()),
                    Err(e) => return Err(SessionError::from(&e)),
                }
            }
            PlaybackSource::Unavailable => {
                return Err(SessionError::new(
                    "You're offline and this item isn't downloaded",
                    true,
                ));
            }
        };
        if let Some(item) = &item {
            self.snapshot.item_name = Some(item.name.clone());
            self.snapshot.duration = item.run_time;
        }

        let start_position = match self.services.positions.load_position(&self.item_id).await {
            Ok(position) => position.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load resume position for {}: {:#}", self.item_id, e);
                Duration::ZERO
            }
        };

        let reference = match &source {
            PlaybackSource::Local(path) => MediaReference {
                uri: path.to_string_lossy().into_owned(),
                start_position,
                is_local: true,
            },
            // Stream; an unavailable source was rejected above
            _ => {
                let Some(item) = item.as_ref() else {
                    return Err(SessionError::new("Item metadata unavailable", true));
                };
                let decision = self
                    .services
                    .analyzer
                    .decide_with_ceiling(item, self.snapshot.bitrate_override);
                let uri = decision.url().map(str::to_string);
                self.snapshot.decision = Some(decision);
                match uri {
                    Some(uri) => MediaReference {
                        uri,
                        start_position,
                        is_local: false,
                    },
                    None => {
                        let message = self
                            .snapshot
                            .decision
                            .as_ref()
                            .map(|d| d.reason().to_string())
                            .unwrap_or_default();
                        return Err(SessionError::new(message, false));
                    }
                }
            }
        };

        self.item = item;
        self.load(reference).await
    }

    /// Best-effort metadata for a downloaded item: one attempt, online only,
    /// kept off the breaker so offline plays never count against streaming
    async fn fetch_local_metadata(&self) -> Option<MediaItem> {
        if !self.services.connectivity.is_online() {
            debug!("Offline, playing {} without metadata", self.item_id);
            return None;
        }

        match self.services.catalog.get_item(&self.item_id).await {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(
                    "Metadata fetch for {} failed, playing offline copy: {}",
                    self.item_id, e
                );
                None
            }
        }
    }

    async fn load(&mut self, reference: MediaReference) -> Result<(), SessionError> {
        debug!(
            "Loading {} at {:?} (local: {})",
            reference.uri, reference.start_position, reference.is_local
        );
        self.engine
            .load_media(&reference)
            .await
            .map_err(|e| SessionError::new(format!("Failed to load media: {:#}", e), true))?;

        self.snapshot.position = reference.start_position;
        self.media = Some(reference);
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        self.require_media("play")?;
        if let Err(e) = self.engine.play().await {
            self.report_error(SessionError::new(format!("Playback failed: {:#}", e), true));
            return Err(e);
        }
        self.set_state(SessionState::Playing);
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.require_media("pause")?;
        if let Err(e) = self.engine.pause().await {
            self.report_error(SessionError::new(format!("Pause failed: {:#}", e), true));
            return Err(e);
        }
        self.set_state(SessionState::Paused);
        self.persist_position().await;
        Ok(())
    }

    async fn seek(&mut self, position: Duration) -> Result<()> {
        self.require_media("seek")?;
        let position = match self.snapshot.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        if let Err(e) = self.engine.seek(position).await {
            self.report_error(SessionError::new(format!("Seek failed: {:#}", e), true));
            return Err(e);
        }
        self.snapshot.position = position;
        self.publish();
        Ok(())
    }

    /// Re-run the decision with a new ceiling and reload at the current position
    async fn change_quality(&mut self, max_bitrate: Option<u64>) -> Result<()> {
        self.require_media("change quality")?;
        let Some(item) = self.item.as_ref() else {
            return Err(anyhow!("Quality cannot change without item metadata"));
        };
        if !matches!(self.snapshot.source, Some(PlaybackSource::Stream)) {
            return Err(anyhow!("Quality cannot change for downloaded media"));
        }

        let decision = self
            .services
            .analyzer
            .decide_with_ceiling(item, max_bitrate);
        let Some(uri) = decision.url().map(str::to_string) else {
            let error = SessionError::new(decision.reason(), false);
            let message = error.message.clone();
            self.report_error(error);
            return Err(anyhow!(message));
        };

        self.snapshot.bitrate_override = max_bitrate;
        let unchanged = self.media.as_ref().is_some_and(|m| m.uri == uri);
        self.snapshot.decision = Some(decision);
        if unchanged {
            debug!("Quality change keeps the current stream");
            self.publish();
            return Ok(());
        }

        let position = self
            .engine
            .get_position()
            .await
            .unwrap_or(self.snapshot.position);
        let was_playing = self.snapshot.state == SessionState::Playing;
        info!(
            "Switching {} to {:?} bps at {:?}",
            self.item_id, max_bitrate, position
        );

        let reference = MediaReference {
            uri,
            start_position: position,
            is_local: false,
        };
        if let Err(error) = self.load(reference).await {
            let message = error.message.clone();
            self.report_error(error);
            return Err(anyhow!(message));
        }
        if was_playing {
            if let Err(e) = self.engine.play().await {
                self.report_error(SessionError::new(format!("Playback failed: {:#}", e), true));
                return Err(e);
            }
        }

        self.refresh_tracks().await;
        self.publish();
        Ok(())
    }

    async fn start_cast(&mut self, target: CastTarget) -> Result<()> {
        self.require_media("cast")?;
        info!("Casting {} to {}", self.item_id, target.device_name);
        self.snapshot.cast_target = Some(target);
        self.publish();
        // The receiver resumes from the last persisted position
        self.persist_position().await;
        Ok(())
    }

    fn stop_cast(&mut self) -> Result<()> {
        if self.snapshot.cast_target.take().is_some() {
            info!("Stopped casting {}", self.item_id);
            self.publish();
        }
        Ok(())
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        trace!("Engine event: {:?}", event);
        match event {
            EngineEvent::StateChanged(PlayerState::Playing) => {
                if matches!(
                    self.snapshot.state,
                    SessionState::Ready | SessionState::Paused
                ) {
                    self.set_state(SessionState::Playing);
                }
            }
            EngineEvent::StateChanged(PlayerState::Paused) => {
                if self.snapshot.state == SessionState::Playing {
                    self.set_state(SessionState::Paused);
                }
            }
            EngineEvent::StateChanged(PlayerState::Error(message))
            | EngineEvent::Error(message) => {
                if self.snapshot.state.has_media() {
                    self.report_error(SessionError::new(message, true));
                }
            }
            EngineEvent::StateChanged(state) => {
                debug!("Engine state {:?}", state);
            }
            EngineEvent::Buffering(buffering) => {
                if self.snapshot.is_buffering != buffering {
                    self.snapshot.is_buffering = buffering;
                    self.publish();
                }
            }
            EngineEvent::TracksChanged => self.refresh_tracks().await,
            EngineEvent::VideoSizeChanged(size) => {
                self.snapshot.video_size = Some(size);
                self.publish();
            }
        }
    }

    async fn refresh_tracks(&mut self) {
        let groups = self.engine.current_tracks().await;
        self.tracks.refresh_tracks(&groups);
    }

    async fn refresh_progress(&mut self) {
        if !self.snapshot.state.has_media() {
            return;
        }

        let position = self.engine.get_position().await;
        let duration = self.engine.get_duration().await;
        let buffered = self.engine.get_buffer_percentage().await;

        let mut next = self.snapshot.clone();
        if let Some(position) = position {
            next.position = position;
        }
        if duration.is_some() {
            next.duration = duration;
        }
        next.buffered_percentage = buffered;

        if next != self.snapshot {
            self.snapshot = next;
            self.publish();
        }
    }

    fn start_position_loop(&mut self) {
        let cancel = self.scope.child_token();
        let tick_tx = self.tick_tx.clone();
        let period = self.services.config.position_update_interval();

        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            if tick_tx.send(()).is_err() {
                                break;
                            }
                        }
                    }
                }
                trace!("Position loop stopped");
            }
        });

        self.position_loop = Some(PositionLoop { cancel, task });
    }

    async fn stop_position_loop(&mut self) {
        if let Some(position_loop) = self.position_loop.take() {
            position_loop.cancel.cancel();
            if let Err(e) = position_loop.task.await {
                warn!("Position loop ended abnormally: {}", e);
            }
        }
    }

    /// Save the current position, or zero once the item counts as finished
    async fn persist_position(&mut self) {
        if self.media.is_none() {
            return;
        }

        let position = self
            .engine
            .get_position()
            .await
            .unwrap_or(self.snapshot.position);
        let duration = match self.engine.get_duration().await {
            Some(duration) => Some(duration),
            None => self.snapshot.duration,
        };
        let to_store =
            resume_position(position, duration, self.services.config.completion_threshold);

        if let Err(e) = self
            .services
            .positions
            .save_position(&self.item_id, to_store, duration)
            .await
        {
            warn!("Failed to persist position for {}: {:#}", self.item_id, e);
        } else {
            debug!("Persisted {:?} for {}", to_store, self.item_id);
        }
    }

    async fn free_engine(&mut self) {
        if self.lease.is_none() {
            return;
        }
        self.engine.release().await;
        self.media = None;
        // Only now may another session claim the slot
        self.lease = None;
        debug!("Engine released for {}", self.snapshot.session_id);
    }

    /// Stop the loop, persist, then free the engine
    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.stop_position_loop().await;
        self.persist_position().await;
        self.free_engine().await;

        if self.snapshot.state != SessionState::Error {
            self.set_state(SessionState::Released);
        }
        info!("Session {} released", self.snapshot.session_id);
    }
}

fn cancelled() -> SessionError {
    SessionError::new("Playback was cancelled", false)
}

/// Position to store for resuming later
pub fn resume_position(
    position: Duration,
    duration: Option<Duration>,
    completion_threshold: f64,
) -> Duration {
    match duration {
        Some(duration) if !duration.is_zero() => {
            if position.as_secs_f64() >= duration.as_secs_f64() * completion_threshold {
                Duration::ZERO
            } else {
                position
            }
        }
        _ => position,
    }
}

/// Handle for talking to a running session. Cheap to clone; dropping the
/// last one tears the session down.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::UnboundedSender<SessionCommand>,
    state_rx: watch::Receiver<SessionSnapshot>,
    tracks_rx: watch::Receiver<TrackSelectionState>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_tracks(&self) -> watch::Receiver<TrackSelectionState> {
        self.tracks_rx.clone()
    }

    pub fn tracks(&self) -> TrackSelectionState {
        self.tracks_rx.borrow().clone()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .map_err(|_| anyhow!("Playback session closed"))?;
        rx.await
            .map_err(|_| anyhow!("Failed to receive response from playback session"))
    }

    pub async fn initialize(&self) -> Result<()> {
        self.request(|respond_to| SessionCommand::Initialize { respond_to })
            .await?
    }

    pub async fn play(&self) -> Result<()> {
        self.request(|respond_to| SessionCommand::Play { respond_to })
            .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|respond_to| SessionCommand::Pause { respond_to })
            .await?
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|respond_to| SessionCommand::Seek {
            position,
            respond_to,
        })
        .await?
    }

    pub async fn change_quality(&self, max_bitrate: Option<u64>) -> Result<()> {
        self.request(|respond_to| SessionCommand::ChangeQuality {
            max_bitrate,
            respond_to,
        })
        .await?
    }

    pub async fn quality_options(&self) -> Result<Vec<QualityOption>> {
        self.request(|respond_to| SessionCommand::GetQualityOptions { respond_to })
            .await
    }

    pub async fn start_cast(&self, target: CastTarget) -> Result<()> {
        self.request(|respond_to| SessionCommand::StartCast { target, respond_to })
            .await?
    }

    pub async fn stop_cast(&self) -> Result<()> {
        self.request(|respond_to| SessionCommand::StopCast { respond_to })
            .await?
    }

    pub async fn select_audio_track(&self, track_id: &str) -> Result<bool> {
        let track_id = track_id.to_string();
        self.request(|respond_to| SessionCommand::SelectAudioTrack {
            track_id,
            respond_to,
        })
        .await
    }

    pub async fn select_subtitle_track(&self, track_id: &str) -> Result<bool> {
        let track_id = track_id.to_string();
        self.request(|respond_to| SessionCommand::SelectSubtitleTrack {
            track_id,
            respond_to,
        })
        .await
    }

    pub async fn toggle_subtitles(&self) -> Result<bool> {
        self.request(|respond_to| SessionCommand::ToggleSubtitles { respond_to })
            .await
    }

    pub fn dismiss_error(&self) -> Result<()> {
        self.sender
            .send(SessionCommand::DismissError)
            .map_err(|_| anyhow!("Playback session closed"))
    }

    /// Stop the position loop, persist the position and free the engine
    pub async fn release(&self) -> Result<()> {
        self.request(|respond_to| SessionCommand::Release { respond_to })
            .await
    }
}
