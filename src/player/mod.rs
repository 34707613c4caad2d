pub mod capability;
pub mod languages;
pub mod session;
pub mod slot;
pub mod tracks;
pub mod traits;
pub mod types;

pub use capability::{PlaybackCapabilityAnalyzer, QualityTier};
pub use session::{
    CastTarget, PlaybackSession, SessionError, SessionHandle, SessionServices, SessionSnapshot,
    SessionState,
};
pub use slot::{EngineLease, EngineSlot};
pub use tracks::{SUBTITLE_OFF_ID, Track, TrackKind, TrackSelectionState, TrackSelector};
pub use traits::PlaybackEngine;
pub use types::{
    EngineEvent, EngineTrackFormat, EngineTrackGroup, MediaReference, PlayerState, TrackOverride,
    TrackSelectionParameters, TrackType,
};
