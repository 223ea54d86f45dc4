//! Settings file loading

use super::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.toml";

/// Candidate settings locations, most specific first
fn settings_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SETTINGS_FILE)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("onionport").join(SETTINGS_FILE));
    }
    paths.push(PathBuf::from("/etc/onionport").join(SETTINGS_FILE));
    paths
}

/// Load settings from `path`, or from the first existing default location.
/// Defaults are used when no file exists.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        return load_from_path(path);
    }

    match find_settings_file() {
        Some(path) => load_from_path(&path),
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}

fn find_settings_file() -> Option<PathBuf> {
    settings_paths().into_iter().find(|p| p.exists())
}

/// Load and parse settings from path
pub fn load_from_path(path: &Path) -> Result<Settings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    let settings: Settings = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

    super::validate(&settings)?;

    Ok(settings)
}
