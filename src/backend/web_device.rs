//! [`DeviceSdk`] over the Web API.
//!
//! Polls the device list for a device by name and the playback state of
//! that device, translating what it sees into [`SdkEvent`]s. Pause and
//! resume are plain player commands.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{DeviceSdk, PlaybackError, SdkEvent};
use crate::catalog::{CatalogApi, CatalogError};

pub struct WebApiDevice {
    catalog: Arc<dyn CatalogApi>,
    credential: String,
    device_id: Arc<Mutex<Option<String>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl WebApiDevice {
    /// Start watching for `device_name`. Must be called inside a tokio runtime.
    ///
    /// Returns the device and the stream of events it produces.
    pub fn connect(
        catalog: Arc<dyn CatalogApi>,
        credential: impl Into<String>,
        device_name: impl Into<String>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SdkEvent>) {
        let credential = credential.into();
        let device_id = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::unbounded_channel();

        let poller = tokio::spawn(poll_device(
            Arc::clone(&catalog),
            credential.clone(),
            device_name.into(),
            poll_interval,
            Arc::clone(&device_id),
            tx,
        ));

        let device = Self {
            catalog,
            credential,
            device_id,
            poller: Mutex::new(Some(poller)),
        };
        (device, rx)
    }

    fn current_device(&self) -> Result<String, PlaybackError> {
        self.device_id.lock().clone().ok_or(PlaybackError::NotReady)
    }
}

/// Map a poll failure to the SDK event that ends the session, if any.
fn fatal_event(err: &CatalogError) -> Option<SdkEvent> {
    match err {
        CatalogError::Unauthorized => Some(SdkEvent::AuthenticationError(err.to_string())),
        CatalogError::Forbidden { .. } if err.is_premium_required() => {
            Some(SdkEvent::AccountError(err.to_string()))
        }
        _ => None,
    }
}

async fn poll_device(
    catalog: Arc<dyn CatalogApi>,
    credential: String,
    device_name: String,
    poll_interval: Duration,
    device_id: Arc<Mutex<Option<String>>>,
    tx: mpsc::UnboundedSender<SdkEvent>,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let devices = match catalog.devices(&credential).await {
            Ok(devices) => devices,
            Err(err) => {
                if let Some(event) = fatal_event(&err) {
                    let _ = tx.send(event);
                    return;
                }
                tracing::warn!("Device list unavailable: {}", err);
                continue;
            }
        };

        let found = devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(&device_name))
            .map(|d| d.id.clone());
        let known = device_id.lock().clone();

        let id = match (known, found) {
            (None, Some(id)) => {
                *device_id.lock() = Some(id.clone());
                if tx.send(SdkEvent::Ready { device_id: id.clone() }).is_err() {
                    return;
                }
                id
            }
            (Some(old), None) => {
                *device_id.lock() = None;
                let _ = tx.send(SdkEvent::NotReady { device_id: old });
                continue;
            }
            (Some(old), Some(id)) if old != id => {
                *device_id.lock() = Some(id.clone());
                let _ = tx.send(SdkEvent::NotReady { device_id: old });
                let _ = tx.send(SdkEvent::Ready { device_id: id.clone() });
                id
            }
            (Some(id), Some(_)) => id,
            (None, None) => {
                tracing::debug!("Waiting for device \"{}\"", device_name);
                continue;
            }
        };

        match catalog.playback_state(&credential).await {
            Ok(Some(snapshot)) if snapshot.device_id.as_deref() == Some(id.as_str()) => {
                let event = SdkEvent::PlayerStateChanged {
                    position: snapshot.position,
                    duration: snapshot.duration,
                    paused: !snapshot.is_playing,
                    track_uri: snapshot.track_uri,
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(err) => {
                if let Some(event) = fatal_event(&err) {
                    let _ = tx.send(event);
                    return;
                }
                tracing::warn!("Playback state unavailable: {}", err);
            }
        }
    }
}

#[async_trait]
impl DeviceSdk for WebApiDevice {
    async fn pause(&self) -> Result<(), PlaybackError> {
        let device_id = self.current_device()?;
        self.catalog
            .pause_playback(&self.credential, &device_id)
            .await
            .map_err(PlaybackError::from)
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        let device_id = self.current_device()?;
        self.catalog
            .resume_playback(&self.credential, &device_id)
            .await
            .map_err(PlaybackError::from)
    }

    async fn disconnect(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
        *self.device_id.lock() = None;
    }
}

impl Drop for WebApiDevice {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.abort();
        }
    }
}
