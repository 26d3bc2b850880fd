//! Local media backend: plays preview clips and picked files directly.
//!
//! No readiness handshake - the element is usable as soon as it exists.
//! End of media and mid-play decode failures are reported as events; both
//! are non-fatal. Events from a resource that has since been replaced are
//! dropped, so a late "ended" can't advance the wrong track.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{BackendEvent, BackendKind, PlaybackBackend, PlaybackError};
use crate::model::{MediaReference, Track};

/// Identifies one successful `load`; events carry it back.
pub type LoadId = u64;

/// What a media element reports about the resource it's playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEventKind {
    Ended,
    Failed(String),
    Progress { position: Duration, duration: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEvent {
    pub load_id: LoadId,
    pub kind: MediaEventKind,
}

/// A single-resource media player (the audio engine, or a fake in tests).
#[async_trait]
pub trait MediaElement: Send {
    /// Fetch and probe `source`, replacing the active resource.
    ///
    /// Fails with [`PlaybackError::MediaUnavailable`] when it can't be read
    /// or decoded.
    async fn load(&mut self, source: &MediaReference) -> Result<LoadId, PlaybackError>;

    /// Start the loaded resource from the beginning.
    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self) -> Result<(), PlaybackError>;

    fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Stop and unload.
    fn stop(&mut self);

    /// Take the event stream. Returns `None` after the first call.
    fn events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>>;
}

/// The resource currently owned by the backend.
#[derive(Debug, Clone)]
struct ActiveMedia {
    load_id: LoadId,
    track_id: String,
}

pub struct LocalMediaBackend<E: MediaElement> {
    element: E,
    active: Arc<Mutex<Option<ActiveMedia>>>,
    events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    forwarder: Option<JoinHandle<()>>,
    disposed: bool,
}

impl<E: MediaElement> LocalMediaBackend<E> {
    /// Wrap `element`. Must be called inside a tokio runtime.
    pub fn new(mut element: E) -> Self {
        let active: Arc<Mutex<Option<ActiveMedia>>> = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::unbounded_channel();

        let forwarder = element.events().map(|mut media_rx| {
            let active = Arc::clone(&active);
            tokio::spawn(async move {
                while let Some(event) = media_rx.recv().await {
                    let Some(track_id) = active
                        .lock()
                        .as_ref()
                        .filter(|a| a.load_id == event.load_id)
                        .map(|a| a.track_id.clone())
                    else {
                        tracing::trace!("Dropping event for stale load {}", event.load_id);
                        continue;
                    };

                    let forwarded = match event.kind {
                        MediaEventKind::Ended => BackendEvent::TrackEnded { track_id },
                        MediaEventKind::Failed(reason) => {
                            BackendEvent::TrackFailed { track_id, reason }
                        }
                        MediaEventKind::Progress { position, duration } => {
                            BackendEvent::Progress { position, duration }
                        }
                    };
                    if tx.send(forwarded).is_err() {
                        break;
                    }
                }
            })
        });

        Self {
            element,
            active,
            events: Some(rx),
            forwarder,
            disposed: false,
        }
    }

    fn ensure_usable(&self) -> Result<(), PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::PlaybackRejected(
                "player was closed".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: MediaElement> PlaybackBackend for LocalMediaBackend<E> {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalMedia
    }

    async fn prepare(&mut self, track: &Track) -> Result<(), PlaybackError> {
        self.ensure_usable()?;

        let Some(source) = track.media_reference.as_ref() else {
            return Err(PlaybackError::MediaUnavailable(format!(
                "\"{}\" has no playable clip",
                track.display_name
            )));
        };

        // Unset first so events from the old resource are dropped while loading
        *self.active.lock() = None;
        let load_id = self.element.load(source).await.map_err(|e| {
            tracing::warn!("Could not load {}: {}", source.describe(), e);
            e
        })?;

        *self.active.lock() = Some(ActiveMedia {
            load_id,
            track_id: track.id.clone(),
        });
        tracing::debug!("Prepared \"{}\" ({})", track.display_name, source.describe());
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        if self.active.lock().is_none() {
            return Err(PlaybackError::PlaybackRejected(
                "no track prepared".to_string(),
            ));
        }
        self.element.play()
    }

    async fn pause(&mut self) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        self.element.pause()
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        if self.active.lock().is_none() {
            return Err(PlaybackError::PlaybackRejected(
                "no track prepared".to_string(),
            ));
        }
        self.element.resume()
    }

    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        *self.active.lock() = None;
        self.element.stop();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        tracing::debug!("Local media backend disposed");
    }

    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.events.take()
    }
}

impl<E: MediaElement> Drop for LocalMediaBackend<E> {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
