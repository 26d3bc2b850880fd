//! Trait definition for the catalog/playback API.
//!
//! The resolver and the remote backend depend on [`CatalogApi`], never on
//! [`SpotifyClient`] directly, so tests can substitute [`mocks::MockCatalog`].

use async_trait::async_trait;

use super::client::SpotifyClient;
use super::domain::{CatalogError, Device, PlaybackSnapshot, UserProfile};
use crate::model::Track;

/// Catalog and remote-playback operations.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// First page of tracks of a playlist.
    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<Track>, CatalogError>;

    async fn current_user(&self, token: &str) -> Result<UserProfile, CatalogError>;

    async fn devices(&self, token: &str) -> Result<Vec<Device>, CatalogError>;

    async fn playback_state(&self, token: &str)
    -> Result<Option<PlaybackSnapshot>, CatalogError>;

    /// "Play this URI on this device".
    async fn start_playback(
        &self,
        token: &str,
        device_id: &str,
        uri: &str,
    ) -> Result<(), CatalogError>;

    async fn resume_playback(&self, token: &str, device_id: &str) -> Result<(), CatalogError>;

    async fn pause_playback(&self, token: &str, device_id: &str) -> Result<(), CatalogError>;
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<Track>, CatalogError> {
        self.playlist_tracks(token, playlist_id).await
    }

    async fn current_user(&self, token: &str) -> Result<UserProfile, CatalogError> {
        self.current_user(token).await
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, CatalogError> {
        self.devices(token).await
    }

    async fn playback_state(
        &self,
        token: &str,
    ) -> Result<Option<PlaybackSnapshot>, CatalogError> {
        self.playback_state(token).await
    }

    async fn start_playback(
        &self,
        token: &str,
        device_id: &str,
        uri: &str,
    ) -> Result<(), CatalogError> {
        self.start_playback(token, device_id, uri).await
    }

    async fn resume_playback(&self, token: &str, device_id: &str) -> Result<(), CatalogError> {
        self.resume_playback(token, device_id).await
    }

    async fn pause_playback(&self, token: &str, device_id: &str) -> Result<(), CatalogError> {
        self.pause_playback(token, device_id).await
    }
}

/// Mock catalog for testing.
///
/// Returns configurable responses and records every call.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// A recorded API call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CatalogCall {
        PlaylistTracks { playlist_id: String },
        CurrentUser,
        Devices,
        PlaybackState,
        StartPlayback { device_id: String, uri: String },
        ResumePlayback { device_id: String },
        PausePlayback { device_id: String },
    }

    /// Mock catalog that returns predefined results.
    pub struct MockCatalog {
        pub tracks: Result<Vec<Track>, CatalogError>,
        pub devices: Mutex<Vec<Device>>,
        /// Error returned by the device list lookup (takes precedence)
        pub devices_error: Mutex<Option<CatalogError>>,
        pub snapshot: Mutex<Option<PlaybackSnapshot>>,
        /// Error returned by every player command (takes precedence)
        pub player_error: Option<CatalogError>,
        /// Delay before player commands return
        pub player_latency: Duration,
        pub calls: Mutex<Vec<CatalogCall>>,
    }

    impl MockCatalog {
        /// Create a mock that serves the given playlist.
        pub fn with_tracks(tracks: Vec<Track>) -> Self {
            Self {
                tracks: Ok(tracks),
                devices: Mutex::new(vec![]),
                devices_error: Mutex::new(None),
                snapshot: Mutex::new(None),
                player_error: None,
                player_latency: Duration::ZERO,
                calls: Mutex::new(vec![]),
            }
        }

        /// Create a mock whose playlist lookup fails.
        pub fn with_error(error: CatalogError) -> Self {
            Self {
                tracks: Err(error),
                ..Self::with_tracks(vec![])
            }
        }

        pub fn calls(&self) -> Vec<CatalogCall> {
            self.calls.lock().clone()
        }

        pub fn set_devices(&self, devices: Vec<Device>) {
            *self.devices.lock() = devices;
        }

        pub fn set_snapshot(&self, snapshot: Option<PlaybackSnapshot>) {
            *self.snapshot.lock() = snapshot;
        }

        pub fn fail_devices(&self, error: CatalogError) {
            *self.devices_error.lock() = Some(error);
        }

        fn record(&self, call: CatalogCall) {
            self.calls.lock().push(call);
        }

        async fn player_result(&self) -> Result<(), CatalogError> {
            if !self.player_latency.is_zero() {
                tokio::time::sleep(self.player_latency).await;
            }
            match &self.player_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CatalogApi for MockCatalog {
        async fn playlist_tracks(
            &self,
            _token: &str,
            playlist_id: &str,
        ) -> Result<Vec<Track>, CatalogError> {
            self.record(CatalogCall::PlaylistTracks {
                playlist_id: playlist_id.to_string(),
            });
            self.tracks.clone()
        }

        async fn current_user(&self, _token: &str) -> Result<UserProfile, CatalogError> {
            self.record(CatalogCall::CurrentUser);
            Ok(UserProfile {
                id: "mock-user".into(),
                display_name: "Mock User".into(),
                image_url: None,
                product: Some("premium".into()),
            })
        }

        async fn devices(&self, _token: &str) -> Result<Vec<Device>, CatalogError> {
            self.record(CatalogCall::Devices);
            if let Some(err) = self.devices_error.lock().clone() {
                return Err(err);
            }
            Ok(self.devices.lock().clone())
        }

        async fn playback_state(
            &self,
            _token: &str,
        ) -> Result<Option<PlaybackSnapshot>, CatalogError> {
            self.record(CatalogCall::PlaybackState);
            Ok(self.snapshot.lock().clone())
        }

        async fn start_playback(
            &self,
            _token: &str,
            device_id: &str,
            uri: &str,
        ) -> Result<(), CatalogError> {
            self.record(CatalogCall::StartPlayback {
                device_id: device_id.to_string(),
                uri: uri.to_string(),
            });
            self.player_result().await
        }

        async fn resume_playback(&self, _token: &str, device_id: &str) -> Result<(), CatalogError> {
            self.record(CatalogCall::ResumePlayback {
                device_id: device_id.to_string(),
            });
            self.player_result().await
        }

        async fn pause_playback(&self, _token: &str, device_id: &str) -> Result<(), CatalogError> {
            self.record(CatalogCall::PausePlayback {
                device_id: device_id.to_string(),
            });
            self.player_result().await
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::test_utils::mock_tracks;

        #[tokio::test]
        async fn test_mock_records_calls() {
            let mock = MockCatalog::with_tracks(mock_tracks(2));
            let tracks = mock.playlist_tracks("t", "pl").await.unwrap();
            assert_eq!(tracks.len(), 2);
            mock.start_playback("t", "dev", "uri").await.unwrap();
            assert_eq!(
                mock.calls(),
                vec![
                    CatalogCall::PlaylistTracks {
                        playlist_id: "pl".into()
                    },
                    CatalogCall::StartPlayback {
                        device_id: "dev".into(),
                        uri: "uri".into()
                    },
                ]
            );
        }

        #[tokio::test]
        async fn test_mock_error() {
            let mock = MockCatalog::with_error(CatalogError::Unauthorized);
            let result = mock.playlist_tracks("t", "pl").await;
            assert_eq!(result, Err(CatalogError::Unauthorized));
        }
    }
}
