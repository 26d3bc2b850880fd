//! Config file commands.

use crate::config::{self, Config};

/// Print the effective configuration
pub fn cmd_config_show() -> anyhow::Result<()> {
    match config::config_path() {
        Some(path) if path.exists() => println!("# {}", path.display()),
        Some(path) => println!("# {} (not created yet, showing defaults)", path.display()),
        None => println!("# no config directory on this system, showing defaults"),
    }
    println!("{}", redacted(&config::load())?);
    Ok(())
}

/// Write a config file with default values
pub fn cmd_config_init(force: bool) -> anyhow::Result<()> {
    let Some(path) = config::config_path() else {
        anyhow::bail!("Could not determine config directory");
    };
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }
    let path = config::save(&Config::default())?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// TOML for display, with the token hidden.
fn redacted(config: &Config) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.credentials.spotify_token.is_some() {
        shown.credentials.spotify_token = Some("<hidden>".to_string());
    }
    Ok(toml::to_string_pretty(&shown)?)
}
