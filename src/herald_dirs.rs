//! Centralized filesystem paths for herald.
//!
//! Uses the [`dirs`] crate for platform-appropriate locations.
//!
//! # Directory Layout
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | State | `~/.local/share/herald/` | `~/Library/Application Support/herald/` |
//! | Config | `~/.config/herald/` | `~/Library/Application Support/herald/` |
//!
//! # Environment Overrides
//!
//! - `HERALD_DATA_DIR` overrides [`data_dir`]
//! - `HERALD_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

fn resolve(env_key: &str, base: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Some(override_dir) = std::env::var_os(env_key) {
        return PathBuf::from(override_dir);
    }
    base.map(|d| d.join("herald"))
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// State root: snapshots, calendar cursor, logs.
///
/// Resolves to `dirs::data_dir()/herald/` by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    resolve("HERALD_DATA_DIR", dirs::data_dir(), "/tmp/herald-data")
}

/// Config root (`config.toml`, recruitment post).
#[must_use]
pub fn config_dir() -> PathBuf {
    resolve("HERALD_CONFIG_DIR", dirs::config_dir(), "/tmp/herald-config")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Snapshot directory (`data_dir()/snapshots/`), one JSON file per source family.
#[must_use]
pub fn snapshots_dir() -> PathBuf {
    data_dir().join("snapshots")
}

/// Calendar cursor file (`data_dir()/calendar_cursor.json`).
#[must_use]
pub fn calendar_cursor_file() -> PathBuf {
    data_dir().join("calendar_cursor.json")
}
