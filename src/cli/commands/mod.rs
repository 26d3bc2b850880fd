//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `play`: load a queue and run a round from the console
//! - `account`: sign-in helpers and the current user
//! - `settings`: show or create the config file

mod account;
mod play;
mod settings;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::runtime::{Builder, Runtime};

pub use account::{cmd_login_url, cmd_token_from_callback, cmd_whoami};
pub use play::cmd_play;
pub use settings::{cmd_config_init, cmd_config_show};

use crate::config::BackendChoice;

/// Beatstop - musical statues for parties
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a round (the default when no command is given)
    Play(PlayArgs),
    /// Show the signed-in account
    Whoami {
        /// Bearer token (or set BEATSTOP_SPOTIFY_TOKEN)
        #[arg(long, env = "BEATSTOP_SPOTIFY_TOKEN")]
        token: Option<String>,
    },
    /// Print the link that starts the sign-in
    LoginUrl {
        /// OAuth client id (defaults to the one in the config file)
        #[arg(long)]
        client_id: Option<String>,
        /// Where the identity provider sends the browser back
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
    },
    /// Extract the token from the URL the browser landed on
    TokenFromCallback {
        /// Full callback URL, e.g. http://localhost:3000/?token=...
        url: String,
        /// Store the token in the config file
        #[arg(long)]
        save: bool,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Overrides for one round; anything left out comes from the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct PlayArgs {
    /// Playlist link, URI or id
    #[arg(long)]
    pub playlist: Option<String>,
    /// Bearer token (or set BEATSTOP_SPOTIFY_TOKEN)
    #[arg(long, env = "BEATSTOP_SPOTIFY_TOKEN")]
    pub token: Option<String>,
    /// Play local files or folders instead of a playlist
    #[arg(long, num_args = 1..)]
    pub local: Vec<PathBuf>,
    /// Name of the registered playback device
    #[arg(long)]
    pub device: Option<String>,
    /// Which backend plays the music
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
    /// Keep playlist order
    #[arg(long)]
    pub no_shuffle: bool,
    /// Resume by itself after SECS seconds
    #[arg(long, value_name = "SECS")]
    pub auto_resume: Option<u32>,
    /// Shortest time before the music stops
    #[arg(long, value_name = "S")]
    pub min: Option<u32>,
    /// Longest time before the music stops
    #[arg(long, value_name = "S")]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Auto,
    Local,
    Remote,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendChoice::Auto,
            BackendArg::Local => BackendChoice::LocalMedia,
            BackendArg::Remote => BackendChoice::RemoteDevice,
        }
    }
}

/// Redirect host used by the hosted sign-in flow during development
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/api/callback";

/// Run the specified CLI command; no command means `play` with defaults.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    // Timers, the stdin reader and the backends all share one thread
    let rt: Runtime = Builder::new_current_thread().enable_all().build()?;

    match &cli.command {
        Some(Commands::Play(args)) => cmd_play(&rt, args),
        None => cmd_play(&rt, &PlayArgs::default()),
        Some(Commands::Whoami { token }) => cmd_whoami(&rt, token.as_deref()),
        Some(Commands::LoginUrl {
            client_id,
            redirect_uri,
        }) => cmd_login_url(client_id.as_deref(), redirect_uri),
        Some(Commands::TokenFromCallback { url, save }) => cmd_token_from_callback(&rt, url, *save),
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init { force } => cmd_config_init(*force),
        },
    }
}
