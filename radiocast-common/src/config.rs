//! Configuration file discovery and loading
//!
//! Resolution order for the config file:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config dir (`~/.config/<app>/config.toml`)
//! 4. System config (`/etc/<app>/config.toml`, Linux only)
//!
//! An explicitly requested file (1 or 2) must exist. A missing discovered
//! file (3 or 4) is not an error; callers fall back to built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve which config file to load, if any
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_exists(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_exists(PathBuf::from(path));
        }
    }

    // Priority 3/4: platform defaults
    Ok(default_config_candidates(app_name)
        .into_iter()
        .find(|candidate| candidate.exists()))
}

fn require_exists(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Default configuration file locations for the platform, in priority order
pub fn default_config_candidates(app_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(app_name).join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(app_name).join("config.toml"));
    }
    candidates
}

/// Parse a TOML config file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))?;
    info!("Loaded configuration from {:?}", path);
    Ok(parsed)
}

/// Resolve and load a config file, falling back to `T::default()` when none exists
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Result<T> {
    match resolve_config_path(cli_arg, env_var_name, app_name)? {
        Some(path) => load_toml(&path),
        None => {
            debug!("No config file found for {}, using built-in defaults", app_name);
            Ok(T::default())
        }
    }
}
