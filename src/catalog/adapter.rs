//! Adapter layer: Convert Web API DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.

use std::collections::HashSet;
use std::time::Duration;

use super::domain::{Device, PlaybackSnapshot, UserProfile};
use super::dto;
use crate::model::{MediaReference, Track, placeholder_artwork};

/// Convert a playlist page into tracks, dropping items without an id and
/// repeats of a track already listed.
///
/// `fallback_preview` stands in for a missing preview clip so the track
/// stays playable on the local backend.
pub fn to_tracks(
    response: dto::PlaylistTracksResponse,
    fallback_preview: Option<&str>,
) -> Vec<Track> {
    let mut seen = HashSet::new();
    response
        .items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(|track| to_track(track, fallback_preview))
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

fn to_track(track: dto::TrackObject, fallback_preview: Option<&str>) -> Option<Track> {
    let id = track.id.filter(|id| !id.is_empty())?;

    let display_artist = if track.artists.is_empty() {
        "Unknown Artist".to_string()
    } else {
        track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let artwork_url = track
        .album
        .and_then(|album| album.images.into_iter().next())
        .map(|image| image.url)
        .unwrap_or_else(|| placeholder_artwork(&id));

    let media_reference = track
        .preview_url
        .or_else(|| fallback_preview.map(str::to_string))
        .map(MediaReference::Preview);

    Some(Track {
        display_name: track.name.unwrap_or_else(|| "Untitled".to_string()),
        display_artist,
        artwork_url,
        media_reference,
        remote_uri: track.uri,
        id,
    })
}

pub fn to_user(response: dto::UserResponse) -> UserProfile {
    UserProfile {
        display_name: response
            .display_name
            .unwrap_or_else(|| response.id.clone()),
        image_url: response.images.into_iter().next().map(|i| i.url),
        product: response.product,
        id: response.id,
    }
}

/// Devices without an id (restricted sessions) can't be targeted and are dropped.
pub fn to_devices(response: dto::DevicesResponse) -> Vec<Device> {
    response
        .devices
        .into_iter()
        .filter_map(|d| {
            Some(Device {
                id: d.id?,
                name: d.name,
                is_active: d.is_active,
            })
        })
        .collect()
}

pub fn to_snapshot(response: dto::PlaybackStateResponse) -> PlaybackSnapshot {
    let (track_uri, duration_ms) = response
        .item
        .map(|item| (item.uri, item.duration_ms.unwrap_or(0)))
        .unwrap_or((None, 0));

    PlaybackSnapshot {
        device_id: response.device.and_then(|d| d.id),
        track_uri,
        position: Duration::from_millis(response.progress_ms.unwrap_or(0)),
        duration: Duration::from_millis(duration_ms),
        is_playing: response.is_playing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_object(id: Option<&str>, preview: Option<&str>) -> dto::TrackObject {
        dto::TrackObject {
            id: id.map(str::to_string),
            name: Some("Song".to_string()),
            uri: id.map(|id| format!("spotify:track:{}", id)),
            preview_url: preview.map(str::to_string),
            artists: vec![
                dto::ArtistObject {
                    name: "First".to_string(),
                },
                dto::ArtistObject {
                    name: "Second".to_string(),
                },
            ],
            album: Some(dto::AlbumObject { images: vec![] }),
        }
    }

    fn page(tracks: Vec<Option<dto::TrackObject>>) -> dto::PlaylistTracksResponse {
        dto::PlaylistTracksResponse {
            items: tracks
                .into_iter()
                .map(|track| dto::PlaylistItem { track })
                .collect(),
            total: None,
            next: None,
        }
    }

    #[test]
    fn test_items_without_id_are_dropped() {
        let response = page(vec![
            Some(track_object(Some("a"), None)),
            None,
            Some(track_object(None, None)),
            Some(track_object(Some(""), None)),
            Some(track_object(Some("b"), None)),
        ]);
        let tracks = to_tracks(response, None);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_repeated_tracks_are_listed_once() {
        let response = page(vec![
            Some(track_object(Some("a"), None)),
            Some(track_object(Some("b"), None)),
            Some(track_object(Some("a"), None)),
        ]);
        let tracks = to_tracks(response, None);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_track_mapping() {
        let tracks = to_tracks(
            page(vec![Some(track_object(Some("a"), Some("https://p.example/a.mp3")))]),
            None,
        );
        let track = &tracks[0];
        assert_eq!(track.display_name, "Song");
        assert_eq!(track.display_artist, "First, Second");
        assert_eq!(track.artwork_url, placeholder_artwork("a"));
        assert_eq!(
            track.media_reference,
            Some(MediaReference::Preview("https://p.example/a.mp3".into()))
        );
        assert_eq!(track.remote_uri.as_deref(), Some("spotify:track:a"));
    }

    #[test]
    fn test_fallback_preview() {
        let without = to_tracks(page(vec![Some(track_object(Some("a"), None))]), None);
        assert!(without[0].media_reference.is_none());
        assert!(without[0].playable_via().remote);

        let with = to_tracks(
            page(vec![Some(track_object(Some("a"), None))]),
            Some("https://sample.example/song.mp3"),
        );
        assert_eq!(
            with[0].media_reference,
            Some(MediaReference::Preview("https://sample.example/song.mp3".into()))
        );
    }

    #[test]
    fn test_album_art_preferred() {
        let mut object = track_object(Some("a"), None);
        object.album = Some(dto::AlbumObject {
            images: vec![
                dto::ImageObject {
                    url: "https://i.example/large".into(),
                },
                dto::ImageObject {
                    url: "https://i.example/small".into(),
                },
            ],
        });
        let tracks = to_tracks(page(vec![Some(object)]), None);
        assert_eq!(tracks[0].artwork_url, "https://i.example/large");
    }

    #[test]
    fn test_snapshot_conversion() {
        let snapshot = to_snapshot(dto::PlaybackStateResponse {
            device: Some(dto::DeviceObject {
                id: Some("dev".into()),
                name: "Speaker".into(),
                is_active: true,
            }),
            progress_ms: Some(1500),
            is_playing: true,
            item: Some(dto::PlaybackItem {
                uri: Some("spotify:track:a".into()),
                duration_ms: Some(30_000),
            }),
        });
        assert_eq!(snapshot.device_id.as_deref(), Some("dev"));
        assert_eq!(snapshot.position, Duration::from_millis(1500));
        assert_eq!(snapshot.duration, Duration::from_secs(30));
        assert!(snapshot.is_playing);
    }

    #[test]
    fn test_devices_without_id_dropped() {
        let devices = to_devices(dto::DevicesResponse {
            devices: vec![
                dto::DeviceObject {
                    id: None,
                    name: "Restricted".into(),
                    is_active: false,
                },
                dto::DeviceObject {
                    id: Some("d1".into()),
                    name: "Party".into(),
                    is_active: false,
                },
            ],
        });
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Party");
    }
}
