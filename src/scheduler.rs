//! Randomized stop timer and the one-second countdown ticker.
//!
//! Both run as tokio tasks and never touch round state themselves: the
//! callbacks they invoke only post events. At most one timer is outstanding
//! per scheduler; re-arming aborts the previous task before spawning a new
//! one, and dropping the scheduler cancels it.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;

/// Pick a whole-second delay uniformly from `[min_seconds, max_seconds]`.
///
/// Bounds are swapped if given in the wrong order.
pub fn pick_delay<R: Rng + ?Sized>(rng: &mut R, min_seconds: u32, max_seconds: u32) -> u32 {
    let (lo, hi) = if min_seconds <= max_seconds {
        (min_seconds, max_seconds)
    } else {
        (max_seconds, min_seconds)
    };
    rng.random_range(lo..=hi)
}

/// One-shot randomized stop timer.
pub struct StopScheduler {
    rng: StdRng,
    timer: Option<JoinHandle<()>>,
}

impl StopScheduler {
    /// Scheduler seeded from the OS.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Scheduler with a fixed seed, for reproducible delays.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self { rng, timer: None }
    }

    /// Arm the timer; `on_fire` runs once after the picked delay unless
    /// canceled first. Replaces any timer that hasn't fired yet.
    ///
    /// Returns the chosen delay.
    pub fn arm<F>(&mut self, min_seconds: u32, max_seconds: u32, on_fire: F) -> Duration
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let delay = Duration::from_secs(u64::from(pick_delay(
            &mut self.rng,
            min_seconds,
            max_seconds,
        )));
        tracing::debug!("Stop armed in {:?}", delay);

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        }));
        delay
    }

    /// Cancel the outstanding timer, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Whether a timer is armed and hasn't fired yet.
    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Default for StopScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StopScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Periodic ticker driving the auto-resume countdown.
///
/// The first tick comes one full period after `start`, not immediately.
pub struct Ticker {
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self { task: None }
    }

    /// Start ticking; `on_tick` runs every `period` until stopped or it
    /// returns `false`. Replaces a running ticker.
    pub fn start<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.stop();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if !on_tick() {
                    break;
                }
            }
        }));
    }

    /// Stop ticking. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
