//! Spotify Web API Data Transfer Objects
//!
//! These types match what the Web API returns. Optional everywhere the API
//! may send `null`. DO NOT use these types outside the catalog module -
//! convert to domain types in `adapter.rs`.
//!
//! API Reference: https://developer.spotify.com/documentation/web-api
//!
//! Example playlist items page:
//! ```json
//! {
//!   "items": [{
//!     "track": {
//!       "id": "4uLU6hMCjMI75M1A2tKUQC",
//!       "name": "Song",
//!       "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
//!       "preview_url": null,
//!       "artists": [{"name": "Artist"}],
//!       "album": {"images": [{"url": "https://i.scdn.co/image/..."}]}
//!     }
//!   }],
//!   "total": 1
//! }
//! ```

use serde::{Deserialize, Serialize};

/// One page of `GET /playlists/{id}/tracks`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistTracksResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub total: Option<u32>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistItem {
    /// `null` for tracks removed from the catalog
    pub track: Option<TrackObject>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackObject {
    pub id: Option<String>,
    pub name: Option<String>,
    pub uri: Option<String>,
    pub preview_url: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: Option<AlbumObject>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageObject {
    pub url: String,
}

/// `GET /me`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageObject>,
    pub product: Option<String>,
}

/// `GET /me/player/devices`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<DeviceObject>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceObject {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

/// `GET /me/player` (204 when nothing is playing)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackStateResponse {
    pub device: Option<DeviceObject>,
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    pub item: Option<PlaybackItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackItem {
    pub uri: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Error envelope returned with non-success statuses
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub status: Option<u16>,
    pub message: Option<String>,
    /// Player endpoints only, e.g. `PREMIUM_REQUIRED`
    pub reason: Option<String>,
}

/// Body for `PUT /me/player/play` when starting a specific track
#[derive(Debug, Clone, Serialize)]
pub struct StartPlaybackBody {
    pub uris: Vec<String>,
}
