//! Engine state and command types.

use std::time::Duration;

use super::decoder::AudioDecoder;
use crate::backend::local::LoadId;

/// Current engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Stopped,
    /// Loaded, waiting for `Play`
    Loaded,
    Playing,
    Paused,
    /// Decoding finished, output still consuming buffered audio
    Draining,
}

impl EngineStatus {
    /// Whether the output callback should be producing sound.
    pub fn is_audible(self) -> bool {
        matches!(self, EngineStatus::Playing | EngineStatus::Draining)
    }
}

/// State shared between the engine handle, the decoder thread and the
/// output callback.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub status: EngineStatus,
    /// Resource whose audio may be rendered; chunks from others are dropped
    pub load_id: Option<LoadId>,
    pub position: Duration,
    pub duration: Duration,
    /// Volume level (0.0 - 1.0)
    pub volume: f32,
    /// Buffer underrun count (for diagnostics)
    pub underruns: u32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            status: EngineStatus::Stopped,
            load_id: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: 1.0,
            underruns: 0,
        }
    }
}

/// Commands sent to the decoder thread.
pub enum EngineCommand {
    /// Replace the active resource
    Load {
        load_id: LoadId,
        decoder: Box<AudioDecoder>,
    },
    /// Start the loaded resource from the beginning
    Play,
    Pause,
    Resume,
    Stop,
    Shutdown,
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Load { load_id, .. } => write!(f, "Load({})", load_id),
            EngineCommand::Play => write!(f, "Play"),
            EngineCommand::Pause => write!(f, "Pause"),
            EngineCommand::Resume => write!(f, "Resume"),
            EngineCommand::Stop => write!(f, "Stop"),
            EngineCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
