//! Track source resolution: configuration in, round queue out.
//!
//! Remote mode reads the first page of a playlist from the catalog; local
//! mode takes the tracks produced by file intake verbatim. Nothing is
//! cached - every call resolves from scratch.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::catalog::{CatalogApi, CatalogError};
use crate::config::{GameConfiguration, MusicSourceMode};
use crate::model::{Queue, Track};

/// Length of a catalog playlist identifier
pub const PLAYLIST_ID_LEN: usize = 22;

/// Errors that can occur while building a queue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Not signed in - connect an account before loading a playlist")]
    MissingCredential,

    #[error("That playlist link doesn't look right: {0}")]
    InvalidReference(String),

    #[error("The session expired - sign in again")]
    AuthExpired,

    #[error("Playlist not found")]
    NotFound,

    #[error("No playable tracks found")]
    EmptyQueue,

    #[error("Music service error: {0}")]
    ServiceError(String),

    #[error("Could not reach the music service: {0}")]
    Network(String),
}

impl From<CatalogError> for SourceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unauthorized => SourceError::AuthExpired,
            CatalogError::NotFound(_) => SourceError::NotFound,
            CatalogError::Network(msg) => SourceError::Network(msg),
            CatalogError::Forbidden { message, .. } => SourceError::ServiceError(message),
            CatalogError::Api { message, .. } => SourceError::ServiceError(message),
            other @ (CatalogError::RateLimited | CatalogError::Parse(_)) => {
                SourceError::ServiceError(other.to_string())
            }
        }
    }
}

/// Extract the playlist identifier from a link, URI or bare id.
///
/// Accepts `https://open.spotify.com/playlist/<id>?si=...`,
/// `spotify:playlist:<id>` and a bare 22-character id. An id following
/// `playlist/` or `playlist:` wins over any other 22-character token.
pub fn parse_playlist_id(reference: &str) -> Option<&str> {
    let reference = reference.trim();

    for marker in ["playlist/", "playlist:"] {
        if let Some(pos) = reference.find(marker) {
            let rest = &reference[pos + marker.len()..];
            let token = leading_alphanumeric(rest);
            if token.len() == PLAYLIST_ID_LEN {
                return Some(token);
            }
        }
    }

    reference
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| token.len() == PLAYLIST_ID_LEN)
}

fn leading_alphanumeric(s: &str) -> &str {
    let end = s
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(s.len());
    &s[..end]
}

/// Build the queue for a round.
///
/// Remote mode checks the credential and the reference before any network
/// call. With `shuffle` the resolved list is permuted once with `rng`;
/// otherwise source order is kept.
pub async fn resolve_queue<C, R>(
    config: &GameConfiguration,
    catalog: &C,
    rng: &mut R,
) -> Result<Queue, SourceError>
where
    C: CatalogApi + ?Sized,
    R: Rng + ?Sized,
{
    let mut tracks = match config.music_source_mode {
        MusicSourceMode::RemoteService => resolve_remote(config, catalog).await?,
        MusicSourceMode::LocalFiles => {
            tracing::debug!("Using {} local tracks", config.local_track_set.len());
            config.local_track_set.clone()
        }
    };

    if config.shuffle {
        tracks.shuffle(rng);
    }

    let queue = Queue::new(tracks).ok_or(SourceError::EmptyQueue)?;
    tracing::info!(
        "Queue ready: {} tracks ({:?}, shuffle={})",
        queue.len(),
        config.music_source_mode,
        config.shuffle
    );
    Ok(queue)
}

async fn resolve_remote<C>(
    config: &GameConfiguration,
    catalog: &C,
) -> Result<Vec<Track>, SourceError>
where
    C: CatalogApi + ?Sized,
{
    let token = config
        .session_credential()
        .ok_or(SourceError::MissingCredential)?;

    let reference = &config.remote_playlist_reference;
    let playlist_id = parse_playlist_id(reference)
        .ok_or_else(|| SourceError::InvalidReference(reference.clone()))?;

    tracing::debug!("Fetching playlist {}", playlist_id);
    catalog
        .playlist_tracks(token, playlist_id)
        .await
        .map_err(|e| {
            tracing::warn!("Playlist {} failed to load: {}", playlist_id, e);
            SourceError::from(e)
        })
}
