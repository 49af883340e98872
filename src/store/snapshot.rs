//! Last-observed state per monitored source.
//!
//! One JSON document per source family under the snapshots directory. A
//! detector loads its family's snapshot at the start of a check and hands
//! back a complete replacement only after a fully parsed fetch and a
//! rendered report.

use crate::error::Result;
use crate::store::persist;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Source families with their own snapshot document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFamily {
    /// GitHub release feeds, keyed by mod name.
    ReleaseFeed,
    /// Steam workshop collection items.
    Workshop,
    /// File-sync repository.
    SyncRepo,
}

impl SourceFamily {
    /// File name of the family's snapshot document.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::ReleaseFeed => "release_feed.json",
            Self::Workshop => "workshop.json",
            Self::SyncRepo => "sync_repo.json",
        }
    }
}

impl std::fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReleaseFeed => write!(f, "release-feed"),
            Self::Workshop => write!(f, "workshop"),
            Self::SyncRepo => write!(f, "sync-repo"),
        }
    }
}

/// State last seen for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
    /// Opaque version token (revision number, `Last-Modified` date, tag).
    pub revision: Option<String>,
    /// Total size in bytes, where the source has one.
    pub size_bytes: u64,
    /// Item id → last-seen version or timestamp.
    pub items: BTreeMap<String, String>,
}

/// All records of one source family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Source id → record.
    pub sources: BTreeMap<String, SourceRecord>,
}

impl Snapshot {
    /// Record for `source`, if one was stored.
    #[must_use]
    pub fn get(&self, source: &str) -> Option<&SourceRecord> {
        self.sources.get(source)
    }

    /// Mutable record for `source`, created empty if missing.
    pub fn entry(&mut self, source: &str) -> &mut SourceRecord {
        self.sources.entry(source.to_owned()).or_default()
    }
}

/// Snapshot documents in one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `dir` (created on first save).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the default snapshots directory.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(crate::herald_dirs::snapshots_dir())
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, family: SourceFamily) -> PathBuf {
        self.dir.join(family.file_name())
    }

    /// Load a family's snapshot; a missing document yields an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but is unreadable or corrupt.
    pub fn load(&self, family: SourceFamily) -> Result<Snapshot> {
        Ok(persist::read_json(&self.path(family))?.unwrap_or_default())
    }

    /// Replace a family's snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn save(&self, family: SourceFamily, snapshot: &Snapshot) -> Result<()> {
        persist::write_json_atomic(&self.path(family), snapshot)?;
        tracing::debug!(%family, sources = snapshot.sources.len(), "snapshot saved");
        Ok(())
    }
}
