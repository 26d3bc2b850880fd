//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`; this module
//! gathers them into one hierarchy. The binary uses `anyhow` on top.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors (e.g., [`SourceError`], [`PlaybackError`]) for
//!   detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use beatstop::error::{Error, Result, ResultExt};
//!
//! async fn enter(config: &GameConfiguration) -> Result<Queue> {
//!     let queue = resolve_queue(config, &catalog, &mut rng).await?; // SourceError converts
//!     std::fs::metadata(path).with_context("while checking local files")?;
//!     Ok(queue)
//! }
//! ```

use crate::auth::AuthError;
use crate::backend::PlaybackError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::intake::IntakeError;
use crate::player::PlayerError;
use crate::round::RoundError;
use crate::source::SourceError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Building the queue failed
    #[error("Couldn't load tracks: {0}")]
    Source(#[from] SourceError),

    /// A backend command failed
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// The audio engine failed
    #[error("Audio error: {0}")]
    Player(#[from] PlayerError),

    #[error("Music service error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sign-in error: {0}")]
    Auth(#[from] AuthError),

    #[error("File intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Round(#[from] RoundError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The session is no longer valid; the user has to sign in again.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Error::Source(SourceError::AuthExpired)
            | Error::Playback(PlaybackError::AuthExpired)
            | Error::Catalog(CatalogError::Unauthorized) => true,
            Error::Round(err) => err.requires_exit(),
            Error::WithContext { source, .. } => source.is_auth_expired(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, SourceError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Source(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, RoundError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Round(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(SourceError::EmptyQueue);
        assert_eq!(err.to_string(), "Couldn't load tracks: No playable tracks found");
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::from(PlaybackError::NotReady).context("while starting the round");
        let msg = err.to_string();
        assert!(msg.contains("while starting the round"));
    }

    #[test]
    fn test_auth_expiry_is_detected_through_context() {
        let err = Error::from(SourceError::AuthExpired).context("loading playlist");
        assert!(err.is_auth_expired());

        let err = Error::from(RoundError::Playback(PlaybackError::AuthExpired));
        assert!(err.is_auth_expired());

        assert!(!Error::from(PlaybackError::PremiumRequired).is_auth_expired());
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<(), SourceError> = Err(SourceError::NotFound);
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));

        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(matches!(
            io.with_context("reading clip"),
            Err(Error::WithContext { .. })
        ));
    }
}
