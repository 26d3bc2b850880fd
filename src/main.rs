//! Beatstop - a musical statues game host.
//!
//! Plays a playlist or local files and stops the music at random moments;
//! everyone freezes until the round continues. Run without arguments to
//! start a round from the console.

pub mod auth;
pub mod backend;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod intake;
pub mod model;
pub mod player;
pub mod round;
pub mod scheduler;
pub mod source;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("beatstop=info".parse()?);
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(&args)
}
