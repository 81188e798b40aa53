//! Configuration file discovery and loading
//!
//! Config file resolution priority:
//! 1. Explicit path (command line / environment), which must exist
//! 2. `~/.config/wavplayer/config.toml`
//! 3. `/etc/wavplayer/config.toml`
//!
//! A missing default file is not an error: the caller falls back to built-in
//! defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR_NAME: &str = "wavplayer";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Locate the configuration file to load.
///
/// Returns `Ok(None)` when no explicit path is given and no default file
/// exists. An explicit path that does not exist is a configuration error.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    for candidate in default_config_paths() {
        if candidate.exists() {
            debug!("Found config file at {}", candidate.display());
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Default config file locations, most specific first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths
}

/// Parse a TOML configuration file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(parsed)
}
