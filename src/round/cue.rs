//! The sound played when the music stops.
//!
//! Best effort: the round never waits for the cue and never fails because
//! of it.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::backend::MediaElement;
use crate::config::Theme;
use crate::model::MediaReference;
use crate::player::{MediaEngine, PlayerError, fetch_media};

/// Fire-and-forget stop sound.
pub trait StopCue: Send {
    fn play(&mut self);
}

/// No sound at all.
#[derive(Debug, Default)]
pub struct SilentCue;

impl StopCue for SilentCue {
    fn play(&mut self) {}
}

struct CueEngine {
    engine: MediaEngine,
    http_client: reqwest::Client,
    /// Downloaded once, decoded on every play
    clip: Option<Vec<u8>>,
}

/// Plays the theme's sound on its own audio engine.
pub struct MediaCue {
    source: MediaReference,
    inner: Arc<Mutex<CueEngine>>,
    task: Option<JoinHandle<()>>,
}

impl MediaCue {
    pub fn new(theme: Theme, volume: f32) -> Result<Self, PlayerError> {
        let engine = MediaEngine::new()?;
        engine.set_volume(volume);
        Ok(Self {
            source: MediaReference::Preview(theme.stop_sound_url().to_string()),
            inner: Arc::new(Mutex::new(CueEngine {
                engine,
                http_client: reqwest::Client::new(),
                clip: None,
            })),
            task: None,
        })
    }
}

async fn play_clip(inner: &Mutex<CueEngine>, source: &MediaReference) -> Result<(), PlayerError> {
    let mut cue = inner.lock().await;
    if cue.clip.is_none() {
        let clip = fetch_media(&cue.http_client, source).await?;
        cue.clip = Some(clip);
    }
    let clip = cue.clip.clone().unwrap_or_default();
    cue.engine.load_bytes(clip, source.extension()).await?;
    cue.engine.play().map_err(|e| PlayerError::Decode(e.to_string()))
}

impl StopCue for MediaCue {
    fn play(&mut self) {
        // A new stop cuts off a cue that is still loading
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let inner = Arc::clone(&self.inner);
        let source = self.source.clone();
        self.task = Some(tokio::spawn(async move {
            if let Err(e) = play_clip(&inner, &source).await {
                tracing::warn!("Stop sound failed: {}", e);
            }
        }));
    }
}

impl Drop for MediaCue {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
