//! Configuration loading for Vega
//!
//! All Vega settings and credential files live in one directory:
//! `$VEGA_CONFIG_DIR` when set, otherwise `~/.config/vega/`.
//!
//! Call [`init`] at startup so the directory exists before the database and
//! any JSON settings are opened inside it.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable that relocates the config directory
pub const CONFIG_DIR_ENV: &str = "VEGA_CONFIG_DIR";

/// Initialize the Vega config directory, creating it if needed.
pub fn init() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Get the Vega config directory
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env_var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|p| p.join("vega"))
}

/// Get the path to a file within the Vega config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Check if a file exists in the Vega config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Load and parse a JSON file from the Vega config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load a JSON file from the config directory, or `T::default()` if it is absent.
///
/// A file that exists but fails to parse is still an error.
pub fn load_json_or_default<T: DeserializeOwned + Default>(filename: &str) -> Result<T> {
    match config_path(filename) {
        Some(path) if path.exists() => load_json_file(&path),
        _ => Ok(T::default()),
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Read an environment variable, treating blank values as unset
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
