//! Playback backends behind one capability set.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  Round (state machine)                    │
//! │     prepare / play / pause / resume / dispose + events    │
//! └────────────────────────────┬──────────────────────────────┘
//!                              │ Box<dyn PlaybackBackend>
//!              ┌───────────────┴────────────────┐
//!              ▼                                ▼
//! ┌────────────────────────────┐  ┌────────────────────────────┐
//! │     LocalMediaBackend      │  │    RemoteDeviceBackend     │
//! │  MediaElement (audio eng.) │  │  DeviceSdk + CatalogApi    │
//! └────────────────────────────┘  └────────────────────────────┘
//! ```
//!
//! The round only ever sees the trait; mode-specific behaviour stays inside
//! each variant.

pub mod local;
pub mod remote;
pub mod web_device;

pub use local::{LocalMediaBackend, MediaElement, MediaEvent};
pub use remote::{DeviceSdk, DeviceStatus, RemoteDeviceBackend, SdkEvent};
pub use web_device::WebApiDevice;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::catalog::CatalogError;
use crate::model::Track;

/// Which variant a backend is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    LocalMedia,
    RemoteDevice,
}

/// Asynchronous notifications from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// The track played to its natural end
    TrackEnded { track_id: String },
    /// The track could not be loaded or decoded mid-play (non-fatal)
    TrackFailed { track_id: String, reason: String },
    /// Playback position update
    Progress { position: Duration, duration: Duration },
    /// The backend can no longer play anything this round
    Fatal(PlaybackError),
}

/// Backend errors, shared across variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("The player isn't ready yet - wait a moment and try again")]
    NotReady,

    #[error("The session expired - sign in again")]
    AuthExpired,

    #[error("Remote playback needs a Premium account")]
    PremiumRequired,

    #[error("The player failed to start: {0}")]
    InitFailed(String),

    #[error("Playback failed: {0}")]
    PlaybackRejected(String),

    /// Local only; the round skips the track instead of halting
    #[error("Track can't be played: {0}")]
    MediaUnavailable(String),
}

impl PlaybackError {
    /// Errors that end the current round attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackError::AuthExpired | PlaybackError::PremiumRequired | PlaybackError::InitFailed(_)
        )
    }
}

impl From<CatalogError> for PlaybackError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unauthorized => PlaybackError::AuthExpired,
            forbidden @ CatalogError::Forbidden { .. } if forbidden.is_premium_required() => {
                PlaybackError::PremiumRequired
            }
            CatalogError::Forbidden { message, .. }
            | CatalogError::NotFound(message)
            | CatalogError::Api { message, .. } => PlaybackError::PlaybackRejected(message),
            other => PlaybackError::PlaybackRejected(other.to_string()),
        }
    }
}

/// Uniform play/pause/resume contract.
///
/// Commands are serialized by the owning round; backends may rely on never
/// seeing two commands at once.
#[async_trait]
pub trait PlaybackBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Make `track` the active track. Does not start playback.
    async fn prepare(&mut self, track: &Track) -> Result<(), PlaybackError>;

    /// Start the prepared track from the beginning.
    async fn play(&mut self) -> Result<(), PlaybackError>;

    async fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Continue the prepared track where it paused.
    async fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Release everything. Idempotent.
    async fn dispose(&mut self);

    /// Take the event stream. Returns `None` after the first call.
    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<BackendEvent>>;
}
