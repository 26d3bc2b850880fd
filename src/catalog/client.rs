//! Spotify Web API HTTP client
//!
//! Covers the handful of endpoints the game needs: the first page of a
//! playlist, the current user, the device list, playback state and the
//! play/pause commands for a device.
//!
//! Every request carries `Authorization: Bearer <token>`. Status handling is
//! shared: 401 → [`CatalogError::Unauthorized`], 403 → `Forbidden` (with the
//! player `reason`, e.g. `PREMIUM_REQUIRED`), 404 → `NotFound`, 429 →
//! `RateLimited`, anything else non-success → `Api` with the service's own
//! message when the body has one.

use super::domain::{CatalogError, Device, PlaybackSnapshot, UserProfile};
use super::{adapter, dto};
use crate::model::Track;

/// Items per page; the game only ever reads the first page
pub const PLAYLIST_PAGE_LIMIT: u32 = 50;

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    base_url: String,
    fallback_preview: Option<String>,
}

impl SpotifyClient {
    /// Create a new client
    pub fn new() -> Self {
        Self::with_base_url("https://api.spotify.com/v1")
    }

    /// Create a client against a custom base URL (tests, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fallback_preview: None,
        }
    }

    /// Use `url` for tracks that come back without a preview clip.
    pub fn with_fallback_preview(mut self, url: Option<impl Into<String>>) -> Self {
        self.fallback_preview = url.map(Into::into);
        self
    }

    /// First page of tracks of a playlist
    pub async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        let url = format!(
            "{}/playlists/{}/tracks?limit={}",
            self.base_url,
            urlencoding::encode(playlist_id),
            PLAYLIST_PAGE_LIMIT
        );

        let response = self.send(self.http_client.get(&url), token).await?;
        let page = response
            .json::<dto::PlaylistTracksResponse>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        tracing::debug!(
            "Playlist {} page: {} items (total {:?})",
            playlist_id,
            page.items.len(),
            page.total
        );
        Ok(adapter::to_tracks(page, self.fallback_preview.as_deref()))
    }

    /// Profile of the signed-in user
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, CatalogError> {
        let url = format!("{}/me", self.base_url);
        let response = self.send(self.http_client.get(&url), token).await?;
        response
            .json::<dto::UserResponse>()
            .await
            .map(adapter::to_user)
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Devices currently registered for the user
    pub async fn devices(&self, token: &str) -> Result<Vec<Device>, CatalogError> {
        let url = format!("{}/me/player/devices", self.base_url);
        let response = self.send(self.http_client.get(&url), token).await?;
        response
            .json::<dto::DevicesResponse>()
            .await
            .map(adapter::to_devices)
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Current playback state, `None` when nothing is active (204)
    pub async fn playback_state(
        &self,
        token: &str,
    ) -> Result<Option<PlaybackSnapshot>, CatalogError> {
        let url = format!("{}/me/player", self.base_url);
        let response = self.send(self.http_client.get(&url), token).await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        if body.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice::<dto::PlaybackStateResponse>(&body)
            .map(|state| Some(adapter::to_snapshot(state)))
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Start `uri` from the beginning on `device_id`
    pub async fn start_playback(
        &self,
        token: &str,
        device_id: &str,
        uri: &str,
    ) -> Result<(), CatalogError> {
        let url = self.player_url("play", device_id);
        let body = dto::StartPlaybackBody {
            uris: vec![uri.to_string()],
        };
        self.send(self.http_client.put(&url).json(&body), token)
            .await
            .map(|_| ())
    }

    /// Resume whatever is loaded on `device_id`
    pub async fn resume_playback(&self, token: &str, device_id: &str) -> Result<(), CatalogError> {
        let url = self.player_url("play", device_id);
        let request = self
            .http_client
            .put(&url)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request, token).await.map(|_| ())
    }

    /// Pause playback on `device_id`
    pub async fn pause_playback(&self, token: &str, device_id: &str) -> Result<(), CatalogError> {
        let url = self.player_url("pause", device_id);
        let request = self
            .http_client
            .put(&url)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request, token).await.map(|_| ())
    }

    fn player_url(&self, command: &str, device_id: &str) -> String {
        format!(
            "{}/me/player/{}?device_id={}",
            self.base_url,
            command,
            urlencoding::encode(device_id)
        )
    }

    /// Attach the bearer token, send, and map non-success statuses.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        token: &str,
    ) -> Result<reqwest::Response, CatalogError> {
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Try to parse error response
        let body = response
            .json::<dto::ErrorResponse>()
            .await
            .ok()
            .map(|e| e.error);
        let message = body
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

        tracing::debug!("API request failed: HTTP {} - {}", status, message);

        Err(match status {
            reqwest::StatusCode::UNAUTHORIZED => CatalogError::Unauthorized,
            reqwest::StatusCode::FORBIDDEN => CatalogError::Forbidden {
                reason: body.and_then(|b| b.reason),
                message,
            },
            reqwest::StatusCode::NOT_FOUND => CatalogError::NotFound(message),
            reqwest::StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited,
            _ => CatalogError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

impl Default for SpotifyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let client = SpotifyClient::new();
        assert_eq!(client.base_url, "https://api.spotify.com/v1");
        assert!(client.fallback_preview.is_none());
    }

    #[test]
    fn test_client_with_custom_url() {
        let client = SpotifyClient::with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_playlist_tracks_sends_bearer_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists/37i9dQZF1DXcBWIGoYBM5M/tracks"))
            .and(query_param("limit", "50"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"track": {"id": "a", "name": "A", "uri": "spotify:track:a",
                               "preview_url": "https://p.example/a.mp3",
                               "artists": [{"name": "X"}], "album": {"images": []}}},
                    {"track": null},
                    {"track": {"id": "b", "name": "B", "uri": "spotify:track:b",
                               "preview_url": null, "artists": [], "album": null}}
                ],
                "total": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SpotifyClient::with_base_url(server.uri());
        let tracks = client
            .playlist_tracks("tok", "37i9dQZF1DXcBWIGoYBM5M")
            .await
            .unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "a");
        assert_eq!(tracks[1].id, "b");
        assert!(tracks[1].media_reference.is_none());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists/expired/tracks"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"status": 401, "message": "The access token expired"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlists/missing/tracks"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"status": 404, "message": "Resource not found"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlists/broken/tracks"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"status": 500, "message": "Server exploded"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlists/bare/tracks"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = SpotifyClient::with_base_url(server.uri());
        assert_eq!(
            client.playlist_tracks("t", "expired").await.unwrap_err(),
            CatalogError::Unauthorized
        );
        assert_eq!(
            client.playlist_tracks("t", "missing").await.unwrap_err(),
            CatalogError::NotFound("Resource not found".into())
        );
        assert_eq!(
            client.playlist_tracks("t", "broken").await.unwrap_err(),
            CatalogError::Api {
                status: 500,
                message: "Server exploded".into()
            }
        );
        assert_eq!(
            client.playlist_tracks("t", "bare").await.unwrap_err(),
            CatalogError::Api {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[tokio::test]
    async fn test_start_playback_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(query_param("device_id", "dev-1"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"uris": ["spotify:track:a"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = SpotifyClient::with_base_url(server.uri());
        client
            .start_playback("tok", "dev-1", "spotify:track:a")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_premium_required() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/pause"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"status": 403, "message": "Player command failed: Premium required",
                          "reason": "PREMIUM_REQUIRED"}
            })))
            .mount(&server)
            .await;

        let client = SpotifyClient::with_base_url(server.uri());
        let err = client.pause_playback("tok", "dev").await.unwrap_err();
        assert!(err.is_premium_required());
    }

    #[tokio::test]
    async fn test_playback_state_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = SpotifyClient::with_base_url(server.uri());
        assert_eq!(client.playback_state("tok").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_current_user_and_devices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "host", "display_name": "Party Host",
                "images": [{"url": "https://i.example/me.jpg"}], "product": "premium"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/player/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "devices": [{"id": "d1", "name": "Living Room", "is_active": true}]
            })))
            .mount(&server)
            .await;

        let client = SpotifyClient::with_base_url(server.uri());
        let user = client.current_user("tok").await.unwrap();
        assert_eq!(user.display_name, "Party Host");
        assert_eq!(user.image_url.as_deref(), Some("https://i.example/me.jpg"));
        assert_eq!(user.has_premium(), Some(true));

        let devices = client.devices("tok").await.unwrap();
        assert_eq!(devices[0].id, "d1");
        assert!(devices[0].is_active);
    }
}
