//! Atomic JSON state files.
//!
//! Writes go to a sibling temp file which is fsynced and then renamed over
//! the target, so a crash leaves either the old or the new document.

use crate::error::{HeraldError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;

/// Read and deserialize a JSON state file. Returns `Ok(None)` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`HeraldError::State`] if the file exists but cannot be read or
/// parsed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(HeraldError::State(format!(
                "failed to read '{}': {e}",
                path.display()
            )));
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| HeraldError::State(format!("failed to parse '{}': {e}", path.display())))
}

/// Serialize `value` and write it atomically (temp file → fsync → rename).
///
/// # Errors
///
/// Returns [`HeraldError::State`] on serialization, write or rename failure.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| HeraldError::State(format!("failed to serialize state: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            HeraldError::State(format!(
                "failed to create state directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
        HeraldError::State(format!(
            "failed to create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(&json)
        .map_err(|e| HeraldError::State(format!("failed to write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| HeraldError::State(format!("failed to sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        HeraldError::State(format!(
            "failed to rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
