//! Observable round state.

/// Where the round is in its play/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundStatus {
    #[default]
    Idle,
    Playing,
    /// Stopped; waits for an explicit continue
    PausedManual,
    /// Stopped; resumes by itself when the countdown reaches zero
    PausedAuto,
}

impl RoundStatus {
    pub fn is_paused(self) -> bool {
        matches!(self, RoundStatus::PausedManual | RoundStatus::PausedAuto)
    }

    pub fn label(self) -> &'static str {
        match self {
            RoundStatus::Idle => "idle",
            RoundStatus::Playing => "playing",
            RoundStatus::PausedManual => "stopped",
            RoundStatus::PausedAuto => "stopped (auto-resume)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoundState {
    pub status: RoundStatus,
    /// 0-based, wraps modulo queue length
    pub current_track_index: usize,
    /// Only set in `PausedAuto`
    pub resume_countdown_seconds: Option<u32>,
}

impl RoundState {
    pub fn idle_at(index: usize) -> Self {
        Self {
            status: RoundStatus::Idle,
            current_track_index: index,
            resume_countdown_seconds: None,
        }
    }
}
