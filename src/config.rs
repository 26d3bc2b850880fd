//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\beatstop\config.toml
//! - macOS: ~/Library/Application Support/beatstop/config.toml
//! - Linux: ~/.config/beatstop/config.toml
//!
//! The persisted [`Config`] outlives rounds. Each round takes an immutable
//! [`GameConfiguration`] snapshot built from it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::Track;

/// Playlist loaded when nothing else is configured
pub const DEFAULT_PLAYLIST_URL: &str = "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M";

/// Sample clip used when a catalog track has no preview
pub const DEFAULT_FALLBACK_PREVIEW_URL: &str =
    "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Game timing settings
    pub game: GameSettings,

    /// Where the music comes from
    pub source: SourceConfig,

    /// Backend settings
    pub playback: PlaybackConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Bearer token for the catalog/playback API
    pub spotify_token: Option<String>,

    /// OAuth client id, only needed to build the login URL
    pub client_id: Option<String>,
}

/// Visual theme; only the stop cue depends on it here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Standard,
    Christmas,
}

impl Theme {
    /// Sound played when the music stops.
    pub fn stop_sound_url(self) -> &'static str {
        match self {
            Theme::Standard => {
                "https://actions.google.com/sounds/v1/emergency/emergency_siren_short_burst.ogg"
            }
            Theme::Christmas => "https://actions.google.com/sounds/v1/alarms/bugle_tune.ogg",
        }
    }
}

/// Stop window and pause behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub min_stop_seconds: u32,
    pub max_stop_seconds: u32,

    /// Countdown length when `auto_resume` is on
    pub pause_duration: u32,

    /// Resume on its own after a stop instead of waiting for the host
    pub auto_resume: bool,

    /// Shuffle the queue once when it's loaded
    pub shuffle: bool,

    pub theme: Theme,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_stop_seconds: 10,
            max_stop_seconds: 30,
            pause_duration: 5,
            auto_resume: false,
            shuffle: true,
            theme: Theme::Standard,
        }
    }
}

/// Music source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicSourceMode {
    #[default]
    RemoteService,
    LocalFiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub mode: MusicSourceMode,

    /// Playlist link or URI (remote mode)
    pub playlist_url: String,

    /// Files or directories to load (local mode)
    pub local_paths: Vec<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: MusicSourceMode::RemoteService,
            playlist_url: DEFAULT_PLAYLIST_URL.to_string(),
            local_paths: Vec::new(),
        }
    }
}

/// Which backend to use for remote-service rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    /// Remote device when `device_name` is set, preview clips otherwise
    #[default]
    Auto,
    LocalMedia,
    RemoteDevice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub backend: BackendChoice,

    /// Name of the registered playback device (remote backend)
    pub device_name: Option<String>,

    /// How long `play` waits for the device to register
    pub ready_timeout_secs: u64,

    /// Device list / playback state polling interval
    pub device_poll_interval_ms: u64,

    /// Used for catalog tracks without a preview clip (empty = none)
    pub fallback_preview_url: String,

    /// Stop cue volume (0.0 - 1.0)
    pub cue_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            device_name: None,
            ready_timeout_secs: 15,
            device_poll_interval_ms: 1000,
            fallback_preview_url: DEFAULT_FALLBACK_PREVIEW_URL.to_string(),
            cue_volume: 0.6,
        }
    }
}

impl PlaybackConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn device_poll_interval(&self) -> Duration {
        Duration::from_millis(self.device_poll_interval_ms.max(100))
    }

    pub fn fallback_preview(&self) -> Option<&str> {
        let url = self.fallback_preview_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

// ============================================================================
// Per-round snapshot
// ============================================================================

/// Immutable settings for one round.
#[derive(Debug, Clone)]
pub struct GameConfiguration {
    pub min_stop_seconds: u32,
    pub max_stop_seconds: u32,
    pub pause_duration: u32,
    pub auto_resume: bool,
    pub shuffle: bool,
    pub theme: Theme,
    pub music_source_mode: MusicSourceMode,
    /// Backend for remote-service rounds
    pub backend: BackendChoice,
    pub remote_playlist_reference: String,
    /// Absent or blank means no authenticated session
    pub credential: Option<String>,
    /// Pre-resolved tracks from file intake
    pub local_track_set: Vec<Track>,
}

impl Default for GameConfiguration {
    fn default() -> Self {
        let game = GameSettings::default();
        Self {
            min_stop_seconds: game.min_stop_seconds,
            max_stop_seconds: game.max_stop_seconds,
            pause_duration: game.pause_duration,
            auto_resume: game.auto_resume,
            shuffle: game.shuffle,
            theme: game.theme,
            music_source_mode: MusicSourceMode::RemoteService,
            backend: BackendChoice::Auto,
            remote_playlist_reference: DEFAULT_PLAYLIST_URL.to_string(),
            credential: None,
            local_track_set: Vec::new(),
        }
    }
}

impl GameConfiguration {
    /// Snapshot the persisted config with the given local tracks.
    pub fn from_config(config: &Config, local_track_set: Vec<Track>) -> Self {
        Self {
            min_stop_seconds: config.game.min_stop_seconds,
            max_stop_seconds: config.game.max_stop_seconds,
            pause_duration: config.game.pause_duration,
            auto_resume: config.game.auto_resume,
            shuffle: config.game.shuffle,
            theme: config.game.theme,
            music_source_mode: config.source.mode,
            backend: config.playback.backend,
            remote_playlist_reference: config.source.playlist_url.clone(),
            credential: config.credentials.spotify_token.clone(),
            local_track_set,
        }
    }

    /// Check `1 <= min <= max`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_stop_seconds == 0 || self.min_stop_seconds > self.max_stop_seconds {
            return Err(ConfigError::InvalidStopWindow {
                min: self.min_stop_seconds,
                max: self.max_stop_seconds,
            });
        }
        Ok(())
    }

    /// The credential, if present and not blank.
    pub fn session_credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beatstop"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if file doesn't exist or can't be parsed.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from a specific file.
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Save configuration to a specific file.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

/// Save configuration without blocking the event loop
pub async fn save_async(config: Config) -> Result<PathBuf, ConfigError> {
    tokio::task::spawn_blocking(move || save(&config))
        .await
        .map_err(|e| ConfigError::TaskJoin(e.to_string()))?
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Invalid stop window: need 1 <= min ({min}) <= max ({max})")]
    InvalidStopWindow { min: u32, max: u32 },
}

// ============================================================================
// Tests
// ============================================================================
