//! Path utilities for slackbot directory resolution.

use anyhow::{Result, anyhow};
use std::path::PathBuf;

const APP_DIR: &str = "slackbot";
const DEFAULT_DB_FILE: &str = "slackbot.db";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable to override the data directory.
const DATA_DIR_ENV: &str = "SLACKBOT_DATA_DIR";

/// Resolve the data directory.
/// Priority: SLACKBOT_DATA_DIR env var > <platform data dir>/slackbot
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| anyhow!("Failed to determine data directory"))
}

/// Ensure the data directory exists and return its path.
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = resolve_data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Default redb database path: <data dir>/slackbot.db
pub fn default_db_path() -> Result<PathBuf> {
    Ok(resolve_data_dir()?.join(DEFAULT_DB_FILE))
}

/// Default configuration file: <config dir>/slackbot/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}
