//! Core data models for a game round.
//!
//! Defines the primary entities: [`Track`] and [`Queue`].
//! Tracks come either from the remote catalog (see [`crate::catalog`]) or from
//! local file intake (see [`crate::intake`]); the queue is built once per round.

use std::path::PathBuf;

/// Placeholder artwork service, keyed by a stable seed.
const ARTWORK_PLACEHOLDER_BASE: &str = "https://picsum.photos/seed";

/// Deterministic placeholder artwork for a track without album art.
pub fn placeholder_artwork(key: &str) -> String {
    format!(
        "{}/{}/400/400",
        ARTWORK_PLACEHOLDER_BASE,
        urlencoding::encode(key)
    )
}

/// Something the local media backend can load and render.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaReference {
    /// Short preview clip served over HTTP(S)
    Preview(String),
    /// File picked by the user, valid for this session only
    LocalBlob(PathBuf),
}

impl MediaReference {
    /// Human-readable location, used in logs.
    pub fn describe(&self) -> String {
        match self {
            MediaReference::Preview(url) => url.clone(),
            MediaReference::LocalBlob(path) => path.display().to_string(),
        }
    }

    /// File extension hint for the decoder probe.
    pub fn extension(&self) -> Option<String> {
        let candidate = match self {
            MediaReference::Preview(url) => {
                // Drop query/fragment before looking at the path
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.rsplit('/').next()?.rsplit_once('.')?.1.to_string()
            }
            MediaReference::LocalBlob(path) => path.extension()?.to_string_lossy().to_string(),
        };
        let candidate = candidate.to_ascii_lowercase();
        (!candidate.is_empty() && candidate.len() <= 5).then_some(candidate)
    }
}

/// Which backends are able to render a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayableVia {
    pub local: bool,
    pub remote: bool,
}

/// A playable track descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Unique within a queue
    pub id: String,
    pub display_name: String,
    pub display_artist: String,
    /// Album art, or a placeholder keyed by id/filename
    pub artwork_url: String,
    /// Resource for the local media backend
    pub media_reference: Option<MediaReference>,
    /// Full-track URI, only usable by the remote device backend
    pub remote_uri: Option<String>,
}

impl Track {
    /// Backends that can play this track.
    pub fn playable_via(&self) -> PlayableVia {
        PlayableVia {
            local: self.media_reference.is_some(),
            remote: self.remote_uri.is_some(),
        }
    }
}

/// The ordered, finite set of tracks for one round.
///
/// Never empty: construction fails on an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    tracks: Vec<Track>,
}

impl Queue {
    /// Build a queue, returning `None` if there are no tracks.
    pub fn new(tracks: Vec<Track>) -> Option<Self> {
        (!tracks.is_empty()).then_some(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track at `index`, wrapping modulo queue length.
    pub fn get(&self, index: usize) -> &Track {
        &self.tracks[index % self.tracks.len()]
    }

    /// Index following `index`, wrapping to 0 after the last track.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.tracks.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}
