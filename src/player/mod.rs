//! Local audio engine: the media element behind the local backend and the
//! stop cue.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    MediaEngine (async side)                     │
//! │     fetches bytes, probes on a blocking task, sends commands    │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ crossbeam channel
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Audio Thread (real-time)                    │
//! │   decodes, resamples, fills the output buffer, emits events     │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ cpal callback
//!                              ▼
//!                        default output device
//! ```

mod audio;
mod decoder;
mod resampler;
mod state;

pub use state::{EngineState, EngineStatus};

use audio::AudioOutput;
use decoder::AudioDecoder;
use state::EngineCommand;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::PlaybackError;
use crate::backend::local::{LoadId, MediaElement, MediaEvent};
use crate::model::MediaReference;

/// The audio engine.
pub struct MediaEngine {
    http_client: reqwest::Client,
    state: Arc<RwLock<EngineState>>,
    output: AudioOutput,
    next_load_id: LoadId,
    events: Option<mpsc::UnboundedReceiver<MediaEvent>>,
}

impl MediaEngine {
    /// Open the default output device.
    ///
    /// Fails with [`PlayerError::AudioInit`] on machines without audio
    /// output.
    pub fn new() -> Result<Self, PlayerError> {
        let state = Arc::new(RwLock::new(EngineState::default()));
        let (events_tx, events) = mpsc::unbounded_channel();
        let output = AudioOutput::start(Arc::clone(&state), events_tx)?;

        Ok(Self {
            http_client: reqwest::Client::new(),
            state,
            output,
            next_load_id: 0,
            events: Some(events),
        })
    }

    /// Set volume (0.0 - 1.0).
    pub fn set_volume(&self, volume: f32) {
        self.state.write().volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.state.read().volume
    }

    /// Current engine state snapshot.
    pub fn state(&self) -> EngineState {
        self.state.read().clone()
    }

    /// Probe `bytes` and make them the active resource.
    pub async fn load_bytes(
        &mut self,
        bytes: Vec<u8>,
        extension: Option<String>,
    ) -> Result<LoadId, PlayerError> {
        let decoder = tokio::task::spawn_blocking(move || {
            AudioDecoder::from_bytes(bytes, extension.as_deref())
        })
        .await
        .map_err(|e| PlayerError::Decode(format!("probe task failed: {}", e)))??;

        self.next_load_id += 1;
        let load_id = self.next_load_id;
        self.output.send(EngineCommand::Load {
            load_id,
            decoder: Box::new(decoder),
        })?;
        Ok(load_id)
    }

    fn send(&self, command: EngineCommand) -> Result<(), PlaybackError> {
        self.output.send(command).map_err(PlaybackError::from)
    }
}

/// Read a media reference into memory.
pub async fn fetch_media(
    http_client: &reqwest::Client,
    source: &MediaReference,
) -> Result<Vec<u8>, PlayerError> {
    match source {
        MediaReference::Preview(url) => {
            let response = http_client
                .get(url)
                .send()
                .await
                .map_err(|e| PlayerError::Fetch(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(PlayerError::Fetch(format!("HTTP {} for {}", status, url)));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| PlayerError::Fetch(e.to_string()))?;
            Ok(bytes.to_vec())
        }
        MediaReference::LocalBlob(path) => tokio::fs::read(path)
            .await
            .map_err(|e| PlayerError::FileNotFound(format!("{}: {}", path.display(), e))),
    }
}

#[async_trait]
impl MediaElement for MediaEngine {
    async fn load(&mut self, source: &MediaReference) -> Result<LoadId, PlaybackError> {
        let bytes = fetch_media(&self.http_client, source).await?;
        let load_id = self.load_bytes(bytes, source.extension()).await?;
        tracing::debug!("Loaded {} as #{}", source.describe(), load_id);
        Ok(load_id)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.send(EngineCommand::Play)
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.send(EngineCommand::Pause)
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        self.send(EngineCommand::Resume)
    }

    fn stop(&mut self) {
        if let Err(e) = self.output.send(EngineCommand::Stop) {
            tracing::debug!("Stop ignored: {}", e);
        }
    }

    fn events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>> {
        self.events.take()
    }
}

/// Engine errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlayerError {
    #[error("Audio output initialization failed: {0}")]
    AudioInit(String),

    #[error("Failed to download audio: {0}")]
    Fetch(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Audio channel closed")]
    ChannelClosed,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl From<PlayerError> for PlaybackError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::AudioInit(_) | PlayerError::ChannelClosed => {
                PlaybackError::InitFailed(err.to_string())
            }
            PlayerError::Fetch(_)
            | PlayerError::Decode(_)
            | PlayerError::UnsupportedFormat(_)
            | PlayerError::FileNotFound(_) => PlaybackError::MediaUnavailable(err.to_string()),
        }
    }
}
