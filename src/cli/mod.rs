//! Command-line interface for beatstop.
//!
//! The `play` command is a console stand-in for the game screen; the rest
//! are account and configuration helpers.

mod commands;

pub use commands::{Cli, Commands, run_command};
