//! Remote device backend: drives a registered playback device.
//!
//! The device lifecycle lives in a `watch` channel fed by a pump task that
//! consumes [`SdkEvent`]s. Events may be buffered before the backend is
//! built. The first `Ready` wins; errors latch.
//!
//! Starting a track is a catalog command ("play this URI on this device").
//! Pausing and resuming an already started track go through the device SDK.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{BackendEvent, BackendKind, PlaybackBackend, PlaybackError};
use crate::catalog::CatalogApi;
use crate::model::Track;

/// Events emitted by a playback device SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    AuthenticationError(String),
    AccountError(String),
    InitializationError(String),
    PlayerStateChanged {
        position: Duration,
        duration: Duration,
        paused: bool,
        track_uri: Option<String>,
    },
}

/// Device lifecycle as observed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Connecting,
    Ready { device_id: String },
    Disconnected,
    Error(PlaybackError),
}

/// Lightweight controls offered by the device itself.
#[async_trait]
pub trait DeviceSdk: Send + Sync {
    async fn pause(&self) -> Result<(), PlaybackError>;

    async fn resume(&self) -> Result<(), PlaybackError>;

    /// Tear the device down. Called at most once.
    async fn disconnect(&self);
}

#[derive(Debug, Clone)]
struct PreparedUri {
    track_id: String,
    uri: String,
    started: bool,
}

/// The started URI, watched for a natural end.
#[derive(Debug, Clone)]
struct Watched {
    track_id: String,
    uri: String,
    heard_playing: bool,
}

pub struct RemoteDeviceBackend {
    sdk: Arc<dyn DeviceSdk>,
    catalog: Arc<dyn CatalogApi>,
    credential: String,
    ready_timeout: Duration,
    status_tx: Arc<watch::Sender<DeviceStatus>>,
    status: watch::Receiver<DeviceStatus>,
    watched: Arc<Mutex<Option<Watched>>>,
    prepared: Option<PreparedUri>,
    events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    pump: Option<JoinHandle<()>>,
    disposed: bool,
}

impl RemoteDeviceBackend {
    /// Attach to a device. Must be called inside a tokio runtime.
    pub fn connect(
        sdk: Arc<dyn DeviceSdk>,
        sdk_events: mpsc::UnboundedReceiver<SdkEvent>,
        catalog: Arc<dyn CatalogApi>,
        credential: impl Into<String>,
        ready_timeout: Duration,
    ) -> Self {
        let (status_tx, status) = watch::channel(DeviceStatus::Connecting);
        let status_tx = Arc::new(status_tx);
        let watched = Arc::new(Mutex::new(None));
        let (events_tx, events) = mpsc::unbounded_channel();

        let pump = tokio::spawn(pump_sdk_events(
            sdk_events,
            Arc::clone(&status_tx),
            Arc::clone(&watched),
            events_tx,
        ));

        Self {
            sdk,
            catalog,
            credential: credential.into(),
            ready_timeout,
            status_tx,
            status,
            watched,
            prepared: None,
            events: Some(events),
            pump: Some(pump),
            disposed: false,
        }
    }

    /// Current device lifecycle state.
    pub fn status(&self) -> DeviceStatus {
        self.status.borrow().clone()
    }

    fn ensure_usable(&self) -> Result<(), PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::PlaybackRejected(
                "player was closed".to_string(),
            ));
        }
        if let DeviceStatus::Error(err) = self.status() {
            return Err(err);
        }
        Ok(())
    }

    /// Wait until the device is ready, or fail once the timeout elapses.
    async fn wait_ready(&self) -> Result<String, PlaybackError> {
        let mut status = self.status.clone();
        let wait = async move {
            loop {
                let current = status.borrow_and_update().clone();
                match current {
                    DeviceStatus::Ready { device_id } => return Ok(device_id),
                    DeviceStatus::Error(err) => return Err(err),
                    DeviceStatus::Connecting | DeviceStatus::Disconnected => {}
                }
                if status.changed().await.is_err() {
                    return Err(PlaybackError::InitFailed(
                        "device event stream closed".to_string(),
                    ));
                }
            }
        };

        match tokio::time::timeout(self.ready_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Device not ready after {:?}", self.ready_timeout);
                Err(PlaybackError::NotReady)
            }
        }
    }

    /// Issue the start command, racing it against a device error.
    async fn start_on_device(&self, device_id: &str, uri: &str) -> Result<(), PlaybackError> {
        let mut status = self.status.clone();
        tokio::select! {
            biased;
            err = next_error(&mut status) => Err(err),
            result = self.catalog.start_playback(&self.credential, device_id, uri) => {
                result.map_err(PlaybackError::from)
            }
        }
    }

    async fn start_prepared(&mut self) -> Result<(), PlaybackError> {
        let Some(prepared) = self.prepared.clone() else {
            return Err(PlaybackError::PlaybackRejected(
                "no track prepared".to_string(),
            ));
        };

        let device_id = self.wait_ready().await?;
        self.start_on_device(&device_id, &prepared.uri).await?;

        tracing::debug!("Started {} on device {}", prepared.uri, device_id);
        *self.watched.lock() = Some(Watched {
            track_id: prepared.track_id.clone(),
            uri: prepared.uri.clone(),
            heard_playing: false,
        });
        if let Some(p) = self.prepared.as_mut() {
            p.started = true;
        }
        Ok(())
    }
}

/// Resolves with the first latched error; pends forever otherwise.
async fn next_error(status: &mut watch::Receiver<DeviceStatus>) -> PlaybackError {
    loop {
        let current = status.borrow_and_update().clone();
        if let DeviceStatus::Error(err) = current {
            return err;
        }
        if status.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

async fn pump_sdk_events(
    mut sdk_events: mpsc::UnboundedReceiver<SdkEvent>,
    status_tx: Arc<watch::Sender<DeviceStatus>>,
    watched: Arc<Mutex<Option<Watched>>>,
    events_tx: mpsc::UnboundedSender<BackendEvent>,
) {
    while let Some(event) = sdk_events.recv().await {
        match event {
            SdkEvent::Ready { device_id } => {
                status_tx.send_if_modified(|status| match status {
                    DeviceStatus::Connecting | DeviceStatus::Disconnected => {
                        tracing::info!("Playback device ready: {}", device_id);
                        *status = DeviceStatus::Ready { device_id };
                        true
                    }
                    DeviceStatus::Ready { .. } | DeviceStatus::Error(_) => false,
                });
            }
            SdkEvent::NotReady { device_id } => {
                status_tx.send_if_modified(|status| match status {
                    DeviceStatus::Ready { device_id: current } if *current == device_id => {
                        tracing::warn!("Playback device went offline: {}", device_id);
                        *status = DeviceStatus::Disconnected;
                        true
                    }
                    _ => false,
                });
            }
            SdkEvent::AuthenticationError(message) => {
                latch_error(&status_tx, &events_tx, PlaybackError::AuthExpired, &message);
            }
            SdkEvent::AccountError(message) => {
                latch_error(&status_tx, &events_tx, PlaybackError::PremiumRequired, &message);
            }
            SdkEvent::InitializationError(message) => {
                let err = PlaybackError::InitFailed(message.clone());
                latch_error(&status_tx, &events_tx, err, &message);
            }
            SdkEvent::PlayerStateChanged {
                position,
                duration,
                paused,
                track_uri,
            } => {
                let _ = events_tx.send(BackendEvent::Progress { position, duration });

                let ended = {
                    let mut watched = watched.lock();
                    let finished = match watched.as_mut() {
                        Some(w) if track_uri.as_deref() == Some(w.uri.as_str()) => {
                            if !paused && !position.is_zero() {
                                w.heard_playing = true;
                            }
                            // Rewound and paused after playing: the device ran out
                            paused && position.is_zero() && w.heard_playing
                        }
                        _ => false,
                    };
                    if finished {
                        watched.take().map(|w| w.track_id)
                    } else {
                        None
                    }
                };

                if let Some(track_id) = ended {
                    tracing::debug!("Remote track {} ended", track_id);
                    let _ = events_tx.send(BackendEvent::TrackEnded { track_id });
                }
            }
        }
    }
    tracing::debug!("Device event stream closed");
}

fn latch_error(
    status_tx: &watch::Sender<DeviceStatus>,
    events_tx: &mpsc::UnboundedSender<BackendEvent>,
    err: PlaybackError,
    message: &str,
) {
    let latched = status_tx.send_if_modified(|status| {
        if matches!(status, DeviceStatus::Error(_)) {
            return false;
        }
        *status = DeviceStatus::Error(err.clone());
        true
    });
    if latched {
        tracing::error!("Playback device error: {} ({})", err, message);
        let _ = events_tx.send(BackendEvent::Fatal(err));
    }
}

#[async_trait]
impl PlaybackBackend for RemoteDeviceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteDevice
    }

    async fn prepare(&mut self, track: &Track) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        let Some(uri) = track.remote_uri.clone() else {
            return Err(PlaybackError::PlaybackRejected(format!(
                "\"{}\" has no full-track URI",
                track.display_name
            )));
        };

        *self.watched.lock() = None;
        self.prepared = Some(PreparedUri {
            track_id: track.id.clone(),
            uri,
            started: false,
        });
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        if let Some(p) = self.prepared.as_mut() {
            p.started = false;
        }
        self.start_prepared().await
    }

    async fn pause(&mut self) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        self.sdk.pause().await
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        self.ensure_usable()?;
        match &self.prepared {
            Some(p) if p.started => self.sdk.resume().await,
            _ => self.start_prepared().await,
        }
    }

    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.sdk.disconnect().await;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.status_tx.send_replace(DeviceStatus::Disconnected);
        tracing::debug!("Remote device backend disposed");
    }

    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.events.take()
    }
}

impl Drop for RemoteDeviceBackend {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
