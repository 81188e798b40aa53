//! Audio file ids and the root directory they live in
//!
//! A file id is a path relative to the configured audio root, `/`-separated.
//! Resolution canonicalizes the joined path and refuses anything that lands
//! outside the (canonical) root, so `..` segments and symlinks cannot escape.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// File extensions offered for playback (lowercase)
const AUDIO_EXTENSIONS: [&str; 4] = ["wav", "wave", "aif", "aiff"];

/// Canonicalize the audio root directory.
///
/// # Errors
/// `Config` if the directory does not exist or is not a directory.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = root.canonicalize().map_err(|e| {
        Error::Config(format!("audio files directory '{}' is not usable: {}", root.display(), e))
    })?;
    if !canonical.is_dir() {
        return Err(Error::Config(format!(
            "audio files directory '{}' is not a directory",
            root.display()
        )));
    }
    Ok(canonical)
}

/// Resolve `file_id` to an existing file under `root`.
///
/// `root` must already be canonical (see [`canonical_root`]).
///
/// # Errors
/// - `FileNotFound` if the file does not exist or is not a regular file
/// - `OutsideRoot` if the resolved path escapes `root`
pub fn resolve(root: &Path, file_id: &str) -> Result<PathBuf> {
    let relative = file_id.trim_start_matches('/');
    let canonical = root.join(relative).canonicalize().map_err(|e| Error::FileNotFound {
        file_id: file_id.to_string(),
        reason: e.to_string(),
    })?;

    if !canonical.starts_with(root) {
        warn!("Rejected file id '{}' resolving to {}", file_id, canonical.display());
        return Err(Error::OutsideRoot(file_id.to_string()));
    }
    if !canonical.is_file() {
        return Err(Error::FileNotFound {
            file_id: file_id.to_string(),
            reason: "not a regular file".to_string(),
        });
    }

    Ok(canonical)
}

/// List playable file ids under `root`, sorted.
///
/// Unreadable entries are logged and skipped.
pub fn list_available_files(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "audio files directory '{}' is not a directory",
            root.display()
        )));
    }

    let mut file_ids = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).into_iter().filter_entry(|e| !is_hidden(e)) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && has_audio_extension(entry.path()) {
                    if let Some(file_id) = file_id_for(root, entry.path()) {
                        file_ids.push(file_id);
                    }
                }
            }
            Err(e) => warn!("Error accessing entry: {}", e),
        }
    }

    file_ids.sort();
    debug!("Found {} audio files under {}", file_ids.len(), root.display());
    Ok(file_ids)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Relative, `/`-separated id of `path` under `root`
fn file_id_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
