//! Test utilities and fixtures for beatstop tests.
//!
//! Track factories, a seeded RNG, and in-memory stand-ins for the audio
//! engine, the device SDK and whole playback backends.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{MockBackend, mock_tracks};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_something() {
//!     let (backend, probe) = MockBackend::new();
//!     let tracks = mock_tracks(3);
//!     // ... test logic, then inspect probe.calls()
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::backend::local::{LoadId, MediaElement, MediaEvent, MediaEventKind};
use crate::backend::{BackendEvent, BackendKind, DeviceSdk, PlaybackBackend, PlaybackError};
use crate::model::{MediaReference, Track, placeholder_artwork};
use crate::round::StopCue;

/// Tracks `track-0..track-{n-1}` with preview clips and no remote URI.
pub fn mock_tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track {
            id: format!("track-{}", i),
            display_name: format!("Song {}", i),
            display_artist: "Test Artist".to_string(),
            artwork_url: placeholder_artwork(&format!("track-{}", i)),
            media_reference: Some(MediaReference::Preview(format!(
                "https://p.scdn.co/mp3-preview/{}.mp3",
                i
            ))),
            remote_uri: None,
        })
        .collect()
}

/// Tracks `remote-0..` with a full-track URI and a preview clip.
pub fn remote_tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track {
            id: format!("remote-{}", i),
            display_name: format!("Remote Song {}", i),
            display_artist: "Test Artist".to_string(),
            artwork_url: placeholder_artwork(&format!("remote-{}", i)),
            media_reference: Some(MediaReference::Preview(format!(
                "https://p.scdn.co/mp3-preview/r{}.mp3",
                i
            ))),
            remote_uri: Some(format!("spotify:track:remote{}", i)),
        })
        .collect()
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Minimal 16-bit PCM WAV.
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let data_len = (frames * channels as usize * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    out.extend_from_slice(&(channels * 2).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames * channels as usize {
        let sample = ((i % 64) as i16 - 32) * 512;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

// ============================================================================
// Media element
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementCall {
    Load(MediaReference),
    Play,
    Pause,
    Resume,
    Stop,
}

/// In-memory media element. Clones share state, so a test can keep one
/// clone while the backend owns another.
#[derive(Clone)]
pub struct FakeMediaElement {
    calls: Arc<Mutex<Vec<ElementCall>>>,
    unloadable: Arc<HashSet<MediaReference>>,
    last_load: Arc<Mutex<LoadId>>,
    tx: mpsc::UnboundedSender<MediaEvent>,
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<MediaEvent>>>>,
}

impl FakeMediaElement {
    pub fn new() -> Self {
        Self::failing(&[])
    }

    /// Element that fails to load the clips of `tracks`.
    pub fn failing(tracks: &[&Track]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            calls: Arc::new(Mutex::new(vec![])),
            unloadable: Arc::new(
                tracks
                    .iter()
                    .filter_map(|t| t.media_reference.clone())
                    .collect(),
            ),
            last_load: Arc::new(Mutex::new(0)),
            tx,
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<ElementCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<MediaEvent> {
        self.tx.clone()
    }

    /// Id of the most recent successful load (0 before any).
    pub fn last_load_id(&self) -> LoadId {
        *self.last_load.lock()
    }

    /// Report `kind` for the most recent load.
    pub fn emit(&self, kind: MediaEventKind) {
        let _ = self.tx.send(MediaEvent {
            load_id: self.last_load_id(),
            kind,
        });
    }

    fn record(&self, call: ElementCall) {
        self.calls.lock().push(call);
    }
}

impl Default for FakeMediaElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for FakeMediaElement {
    async fn load(&mut self, source: &MediaReference) -> Result<LoadId, PlaybackError> {
        self.record(ElementCall::Load(source.clone()));
        if self.unloadable.contains(source) {
            return Err(PlaybackError::MediaUnavailable(source.describe()));
        }
        let mut last = self.last_load.lock();
        *last += 1;
        Ok(*last)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.record(ElementCall::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        self.record(ElementCall::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        self.record(ElementCall::Resume);
        Ok(())
    }

    fn stop(&mut self) {
        self.record(ElementCall::Stop);
    }

    fn events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>> {
        self.rx.lock().take()
    }
}

// ============================================================================
// Device SDK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkCall {
    Pause,
    Resume,
    Disconnect,
}

#[derive(Default)]
pub struct FakeDeviceSdk {
    calls: Mutex<Vec<SdkCall>>,
}

impl FakeDeviceSdk {
    pub fn calls(&self) -> Vec<SdkCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DeviceSdk for FakeDeviceSdk {
    async fn pause(&self) -> Result<(), PlaybackError> {
        self.calls.lock().push(SdkCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        self.calls.lock().push(SdkCall::Resume);
        Ok(())
    }

    async fn disconnect(&self) {
        self.calls.lock().push(SdkCall::Disconnect);
    }
}

// ============================================================================
// Playback backend
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Prepare(String),
    Play,
    Pause,
    Resume,
    Dispose,
}

#[derive(Default)]
struct MockBackendShared {
    calls: Vec<BackendCall>,
    /// Track ids whose prepare fails with `MediaUnavailable`
    unplayable: HashSet<String>,
    /// One-shot failures keyed by command name
    failures: HashMap<&'static str, PlaybackError>,
}

/// Backend that records commands and plays nothing.
pub struct MockBackend {
    shared: Arc<Mutex<MockBackendShared>>,
    events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
}

/// Test-side handle to a [`MockBackend`].
#[derive(Clone)]
pub struct MockBackendProbe {
    shared: Arc<Mutex<MockBackendShared>>,
    tx: mpsc::UnboundedSender<BackendEvent>,
}

impl MockBackend {
    pub fn new() -> (Self, MockBackendProbe) {
        let shared = Arc::new(Mutex::new(MockBackendShared::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Self {
            shared: Arc::clone(&shared),
            events: Some(rx),
        };
        (backend, MockBackendProbe { shared, tx })
    }

    fn command(&self, name: &'static str, call: BackendCall) -> Result<(), PlaybackError> {
        let mut shared = self.shared.lock();
        shared.calls.push(call);
        match shared.failures.remove(name) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl MockBackendProbe {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.shared.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    pub fn mark_unplayable(&self, track_id: &str) {
        self.shared.lock().unplayable.insert(track_id.to_string());
    }

    /// Make the next `command` ("prepare", "play", "pause", "resume") fail.
    pub fn fail_next(&self, command: &'static str, err: PlaybackError) {
        self.shared.lock().failures.insert(command, err);
    }

    pub fn send(&self, event: BackendEvent) {
        let _ = self.tx.send(event);
    }

    pub fn dispose_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == BackendCall::Dispose)
            .count()
    }
}

#[async_trait]
impl PlaybackBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalMedia
    }

    async fn prepare(&mut self, track: &Track) -> Result<(), PlaybackError> {
        self.command("prepare", BackendCall::Prepare(track.id.clone()))?;
        if self.shared.lock().unplayable.contains(&track.id) {
            return Err(PlaybackError::MediaUnavailable(track.id.clone()));
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        self.command("play", BackendCall::Play)
    }

    async fn pause(&mut self) -> Result<(), PlaybackError> {
        self.command("pause", BackendCall::Pause)
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        self.command("resume", BackendCall::Resume)
    }

    async fn dispose(&mut self) {
        self.shared.lock().calls.push(BackendCall::Dispose);
    }

    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.events.take()
    }
}

// ============================================================================
// Stop cue
// ============================================================================

/// Stop cue that only counts how often it was played.
#[derive(Clone, Default)]
pub struct RecordingCue {
    plays: Arc<AtomicUsize>,
}

impl RecordingCue {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl StopCue for RecordingCue {
    fn play(&mut self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}
