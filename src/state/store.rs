//! Whole-document JSON persistence.
//!
//! Documents are written to a sibling temporary file, synced, and renamed over
//! the target, so a crash leaves either the previous or the new version.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::StateError;

/// Reads a JSON document, returning `None` when the file does not exist.
///
/// # Errors
///
/// Returns [`StateError`] if the file exists but cannot be read or parsed.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(StateError::io(path, error)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| StateError::json(path, error))
}

/// Atomically replaces `path` with the pretty-printed JSON of `value`.
///
/// # Errors
///
/// Returns [`StateError`] on any encoding or filesystem failure.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StateError> {
    ensure_parent(path)?;
    let tmp_path = temporary_sibling(path);

    let file = File::create(&tmp_path).map_err(|e| StateError::io(&tmp_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| StateError::json(&tmp_path, e))?;
    writer.flush().map_err(|e| StateError::io(&tmp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| StateError::io(&tmp_path, e))?;
    drop(writer);

    fs::rename(&tmp_path, path).map_err(|e| StateError::io(path, e))?;
    debug!(path = %path.display(), "persisted state document");
    Ok(())
}

/// Writes raw markup for later inspection.
///
/// # Errors
///
/// Returns [`StateError::Io`] if the file cannot be written.
pub(crate) fn write_snapshot(path: &Path, markup: &str) -> Result<(), StateError> {
    ensure_parent(path)?;
    fs::write(path, markup).map_err(|e| StateError::io(path, e))
}

fn ensure_parent(path: &Path) -> Result<(), StateError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
