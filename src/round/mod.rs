//! The round state machine.
//!
//! A [`Round`] owns the queue, the backend and both timers for one session
//! of the game. Every mutation happens inside a `Round` method: caller
//! actions (`start`, `continue_playing`, `skip`, `exit`) and events pulled
//! with [`Round::next_event`] and applied with [`Round::handle`].
//!
//! ```text
//!            start                 stop fires
//!   IDLE ───────────▶ PLAYING ─────────────────▶ PAUSED_MANUAL
//!    ▲                  ▲  │                        │ continue
//!    │ skip / end       │  └──────────▶ PAUSED_AUTO │
//!    └──────────────────┴──── continue / countdown 0┘
//! ```
//!
//! Timers never touch the round. They post [`RoundEvent`]s tagged with the
//! generation current when they were armed; every arm and cancel bumps the
//! generation, so an event from a timer that was canceled after it fired
//! is recognised as stale and dropped.

pub mod cue;
mod state;

pub use cue::{MediaCue, SilentCue, StopCue};
pub use state::{RoundState, RoundStatus};

use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::backend::{BackendEvent, BackendKind, PlaybackBackend, PlaybackError};
use crate::config::{ConfigError, GameConfiguration};
use crate::model::{Queue, Track};
use crate::scheduler::{StopScheduler, Ticker};
use crate::source::SourceError;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Something the round reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    StopFired { generation: u64 },
    CountdownTick { generation: u64 },
    Backend(BackendEvent),
}

/// Round errors
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Can't {action} while {}", .status.label())]
    InvalidAction {
        action: &'static str,
        status: RoundStatus,
    },
}

impl RoundError {
    /// The session is gone; the caller has to leave the round.
    pub fn requires_exit(&self) -> bool {
        matches!(
            self,
            RoundError::Playback(PlaybackError::AuthExpired) | RoundError::Source(SourceError::AuthExpired)
        )
    }
}

pub struct Round {
    config: GameConfiguration,
    queue: Queue,
    /// Taken by `exit`, or by `Drop` when `exit` never ran
    backend: Option<Box<dyn PlaybackBackend>>,
    backend_events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    cue: Box<dyn StopCue>,
    scheduler: StopScheduler,
    ticker: Ticker,
    generation: u64,
    timer_tx: mpsc::UnboundedSender<RoundEvent>,
    timer_rx: mpsc::UnboundedReceiver<RoundEvent>,
    state: RoundState,
    state_tx: watch::Sender<RoundState>,
    /// Fatal backend error; every later start returns it
    latched: Option<PlaybackError>,
    progress: Option<(Duration, Duration)>,
}

impl Round {
    /// Enter a round. Starts IDLE at the first track.
    pub fn new(
        config: GameConfiguration,
        queue: Queue,
        mut backend: Box<dyn PlaybackBackend>,
        cue: Box<dyn StopCue>,
    ) -> Result<Self, RoundError> {
        config.validate()?;

        let backend_events = backend.subscribe();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let state = RoundState::default();
        let (state_tx, _) = watch::channel(state.clone());

        tracing::info!(
            "Round entered: {} tracks, {:?} backend, stop every {}-{}s",
            queue.len(),
            backend.kind(),
            config.min_stop_seconds,
            config.max_stop_seconds
        );

        Ok(Self {
            config,
            queue,
            backend: Some(backend),
            backend_events,
            cue,
            scheduler: StopScheduler::new(),
            ticker: Ticker::new(),
            generation: 0,
            timer_tx,
            timer_rx,
            state,
            state_tx,
            latched: None,
            progress: None,
        })
    }

    /// Use a specific scheduler (a seeded one, in tests).
    pub fn with_scheduler(mut self, scheduler: StopScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn state(&self) -> RoundState {
        self.state.clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<RoundState> {
        self.state_tx.subscribe()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn current_track(&self) -> &Track {
        self.queue.get(self.state.current_track_index)
    }

    /// Last reported playback position and duration.
    pub fn progress(&self) -> Option<(Duration, Duration)> {
        self.progress
    }

    /// Which backend plays the music; `None` once the round has ended.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    /// The latched fatal error, if any.
    pub fn fatal_error(&self) -> Option<&PlaybackError> {
        self.latched.as_ref()
    }

    // ------------------------------------------------------------------
    // Caller actions
    // ------------------------------------------------------------------

    /// IDLE -> PLAYING: play the current track and arm the stop timer.
    ///
    /// Tracks that can't be loaded are skipped, at most one pass over the
    /// queue.
    pub async fn start(&mut self) -> Result<(), RoundError> {
        if let Some(err) = &self.latched {
            return Err(err.clone().into());
        }
        self.require(RoundStatus::Idle, "start")?;

        let started = self.play_from(self.state.current_track_index).await;
        let index = match started {
            Ok(index) => index,
            Err(RoundError::Playback(err)) if err.is_terminal() => return Err(self.halt(err)),
            Err(err) => return Err(err),
        };

        self.state.current_track_index = index;
        self.state.status = RoundStatus::Playing;
        self.state.resume_countdown_seconds = None;
        self.arm_stop();
        self.publish();
        tracing::info!("Playing \"{}\"", self.current_track().display_name);
        Ok(())
    }

    /// PAUSED -> PLAYING via the backend's resume.
    pub async fn continue_playing(&mut self) -> Result<(), RoundError> {
        if !self.state.status.is_paused() {
            return Err(RoundError::InvalidAction {
                action: "continue",
                status: self.state.status,
            });
        }

        self.backend()?.resume().await?;
        self.enter_playing();
        Ok(())
    }

    /// Any -> IDLE at the next track.
    pub async fn skip(&mut self) -> Result<(), RoundError> {
        if self.state.status != RoundStatus::Idle {
            self.backend()?.pause().await?;
        }

        self.cancel_timers();
        self.state = RoundState::idle_at(self.queue.next_index(self.state.current_track_index));
        self.publish();
        tracing::debug!("Skipped to track {}", self.state.current_track_index);
        Ok(())
    }

    /// Leave the round, releasing the backend.
    pub async fn exit(mut self) {
        self.cancel_timers();
        if let Some(mut backend) = self.backend.take() {
            backend.dispose().await;
        }
        tracing::info!("Round exited");
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Wait for the next timer or backend event.
    ///
    /// Cancel safe.
    pub async fn next_event(&mut self) -> Option<RoundEvent> {
        let backend_events = &mut self.backend_events;
        tokio::select! {
            Some(event) = self.timer_rx.recv() => Some(event),
            Some(event) = recv_backend(backend_events) => Some(RoundEvent::Backend(event)),
            else => None,
        }
    }

    /// Apply one event.
    pub async fn handle(&mut self, event: RoundEvent) -> Result<(), RoundError> {
        match event {
            RoundEvent::StopFired { generation } => {
                if generation != self.generation || self.state.status != RoundStatus::Playing {
                    tracing::trace!("Ignoring stale stop");
                    return Ok(());
                }
                self.on_stop().await
            }
            RoundEvent::CountdownTick { generation } => {
                if generation != self.generation || self.state.status != RoundStatus::PausedAuto {
                    tracing::trace!("Ignoring stale countdown tick");
                    return Ok(());
                }
                self.on_tick().await
            }
            RoundEvent::Backend(event) => self.on_backend(event).await,
        }
    }

    /// Wait for the next event and apply it.
    pub async fn step(&mut self) -> Result<(), RoundError> {
        match self.next_event().await {
            Some(event) => self.handle(event).await,
            None => Ok(()),
        }
    }

    async fn on_stop(&mut self) -> Result<(), RoundError> {
        let paused = self.backend()?.pause().await;
        if let Err(err) = paused {
            if err.is_terminal() {
                return Err(self.halt(err));
            }
            // Still playing, so the next stop has to be drawn again
            tracing::warn!("Couldn't stop the music: {}", err);
            self.arm_stop();
            return Err(err.into());
        }
        self.cue.play();
        tracing::info!("Music stopped");

        if !self.config.auto_resume {
            self.state.status = RoundStatus::PausedManual;
            self.publish();
            return Ok(());
        }

        if self.config.pause_duration == 0 {
            self.backend()?.resume().await?;
            self.enter_playing();
            return Ok(());
        }

        self.state.status = RoundStatus::PausedAuto;
        self.state.resume_countdown_seconds = Some(self.config.pause_duration);
        self.start_countdown();
        self.publish();
        Ok(())
    }

    async fn on_tick(&mut self) -> Result<(), RoundError> {
        let remaining = self
            .state
            .resume_countdown_seconds
            .unwrap_or(0)
            .saturating_sub(1);
        self.state.resume_countdown_seconds = Some(remaining);
        self.publish();
        if remaining > 0 {
            return Ok(());
        }

        self.cancel_timers();
        match self.backend()?.resume().await {
            Ok(()) => {
                self.enter_playing();
                Ok(())
            }
            Err(err) => {
                // Can't resume by ourselves; leave it to the players
                tracing::warn!("Auto-resume failed: {}", err);
                self.state.status = RoundStatus::PausedManual;
                self.state.resume_countdown_seconds = None;
                self.publish();
                Err(err.into())
            }
        }
    }

    async fn on_backend(&mut self, event: BackendEvent) -> Result<(), RoundError> {
        match event {
            BackendEvent::TrackEnded { track_id } => {
                if self.state.status == RoundStatus::Idle || track_id != self.current_track().id {
                    return Ok(());
                }
                tracing::debug!("Track {} ended", track_id);
                self.cancel_timers();
                self.state = RoundState::idle_at(self.queue.next_index(self.state.current_track_index));
                self.publish();
                Ok(())
            }
            BackendEvent::TrackFailed { track_id, reason } => {
                if self.state.status == RoundStatus::Idle || track_id != self.current_track().id {
                    return Ok(());
                }
                tracing::warn!("Track {} failed mid-play: {}", track_id, reason);
                self.cancel_timers();
                self.state = RoundState::idle_at(self.queue.next_index(self.state.current_track_index));
                self.publish();
                self.start().await
            }
            BackendEvent::Progress { position, duration } => {
                self.progress = Some((position, duration));
                Ok(())
            }
            BackendEvent::Fatal(err) => Err(self.halt(err)),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require(&self, status: RoundStatus, action: &'static str) -> Result<(), RoundError> {
        if self.state.status != status {
            return Err(RoundError::InvalidAction {
                action,
                status: self.state.status,
            });
        }
        Ok(())
    }

    fn backend(&mut self) -> Result<&mut Box<dyn PlaybackBackend>, RoundError> {
        self.backend.as_mut().ok_or_else(|| {
            RoundError::Playback(PlaybackError::PlaybackRejected(
                "the round has ended".to_string(),
            ))
        })
    }

    /// Prepare and play from `index`, skipping unplayable tracks. Returns
    /// the index that is now playing.
    async fn play_from(&mut self, index: usize) -> Result<usize, RoundError> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(PlaybackError::PlaybackRejected("the round has ended".to_string()).into());
        };

        let mut index = index;
        for _ in 0..self.queue.len() {
            let track = self.queue.get(index);
            let attempt = match backend.prepare(track).await {
                Ok(()) => backend.play().await,
                Err(err) => Err(err),
            };
            match attempt {
                Ok(()) => return Ok(index),
                Err(PlaybackError::MediaUnavailable(reason)) => {
                    tracing::warn!("Skipping \"{}\": {}", track.display_name, reason);
                    index = self.queue.next_index(index);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(PlaybackError::PlaybackRejected(format!(
            "none of the {} tracks could be played",
            self.queue.len()
        ))
        .into())
    }

    /// Go IDLE at the current track and latch `err`; the first one wins.
    fn halt(&mut self, err: PlaybackError) -> RoundError {
        tracing::error!("Playback halted: {}", err);
        self.cancel_timers();
        self.state = RoundState::idle_at(self.state.current_track_index);
        if self.latched.is_none() {
            self.latched = Some(err.clone());
        }
        self.publish();
        err.into()
    }

    fn enter_playing(&mut self) {
        self.cancel_timers();
        self.state.status = RoundStatus::Playing;
        self.state.resume_countdown_seconds = None;
        self.arm_stop();
        self.publish();
    }

    fn arm_stop(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.timer_tx.clone();
        self.scheduler.arm(
            self.config.min_stop_seconds,
            self.config.max_stop_seconds,
            move || {
                let _ = tx.send(RoundEvent::StopFired { generation });
            },
        );
    }

    fn start_countdown(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.timer_tx.clone();
        self.ticker.start(COUNTDOWN_TICK, move || {
            tx.send(RoundEvent::CountdownTick { generation }).is_ok()
        });
    }

    fn cancel_timers(&mut self) {
        self.generation += 1;
        self.scheduler.cancel();
        self.ticker.stop();
    }

    fn publish(&self) {
        tracing::debug!(
            "Round {} at track {} (countdown {:?})",
            self.state.status.label(),
            self.state.current_track_index,
            self.state.resume_countdown_seconds
        );
        self.state_tx.send_replace(self.state.clone());
    }
}

async fn recv_backend(
    events: &mut Option<mpsc::UnboundedReceiver<BackendEvent>>,
) -> Option<BackendEvent> {
    match events {
        Some(rx) => {
            let event = rx.recv().await;
            if event.is_none() {
                *events = None;
            }
            event
        }
        None => std::future::pending().await,
    }
}

impl Drop for Round {
    fn drop(&mut self) {
        self.cancel_timers();
        if let Some(mut backend) = self.backend.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        backend.dispose().await;
                    });
                }
                Err(_) => tracing::warn!("Round dropped outside a runtime; backend not disposed"),
            }
        }
    }
}
