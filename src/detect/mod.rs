//! Change detectors.
//!
//! Each detector fetches the live state of one source family, diffs it
//! against the family's [`Snapshot`] and renders a report. [`run_detector`]
//! drives the common cycle: load snapshot, observe, persist, classify.
//! Expected failures (network, parse, state) never escape: they come back as
//! [`Detection::Failed`] with the previous snapshot left on disk. A detector
//! watching several independent sources reports the ones that failed in
//! [`Observation::errors`] and still delivers the rest as
//! [`Detection::Partial`].

pub mod release;
pub mod sources;
pub mod sync_repo;
pub mod workshop;

pub use release::ReleaseFeedDetector;
pub use sources::{ReleaseSource, SyncRepoSource, WorkshopSource};
pub use sync_repo::SyncRepoDetector;
pub use workshop::WorkshopDetector;

use crate::error::Result;
use crate::store::{Snapshot, SnapshotStore, SourceFamily};
use async_trait::async_trait;

/// What one observation of a source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Complete replacement for the family's snapshot.
    pub snapshot: Snapshot,
    /// Rendered report when something reportable changed.
    pub report: Option<String>,
    /// Sources that could not be checked; their records were carried over.
    pub errors: Vec<String>,
}

impl Observation {
    /// Nothing new: keep `previous` and report nothing.
    #[must_use]
    pub fn unchanged(previous: &Snapshot) -> Self {
        Self {
            snapshot: previous.clone(),
            report: None,
            errors: Vec::new(),
        }
    }
}

/// Outcome of one detector run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// No reportable change.
    Unchanged,
    /// Something changed; `report` is ready to post.
    Changed {
        /// Rendered report.
        report: String,
    },
    /// The check failed; the snapshot was not modified.
    Failed {
        /// Diagnostic for the operator channel.
        error: String,
    },
    /// Some sources failed; the others were checked and saved.
    Partial {
        /// Report for the sources that were checked.
        report: Option<String>,
        /// One diagnostic per failed source.
        errors: Vec<String>,
    },
}

impl Detection {
    /// `true` when there is a report to post.
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(self, Self::Changed { .. } | Self::Partial { report: Some(_), .. })
    }

    /// Report text, else the first error text, else empty.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Unchanged => "",
            Self::Changed { report } => report,
            Self::Failed { error } => error,
            Self::Partial { report, errors } => report
                .as_deref()
                .or_else(|| errors.first().map(String::as_str))
                .unwrap_or_default(),
        }
    }

    /// Report (if any) and diagnostics (if any), whatever the variant.
    #[must_use]
    pub fn into_parts(self) -> (Option<String>, Vec<String>) {
        match self {
            Self::Unchanged => (None, Vec::new()),
            Self::Changed { report } => (Some(report), Vec::new()),
            Self::Failed { error } => (None, vec![error]),
            Self::Partial { report, errors } => (report, errors),
        }
    }
}

/// A source family that can be diffed against its snapshot.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    /// Family whose snapshot this detector owns.
    fn family(&self) -> SourceFamily;

    /// Fetch the live state and diff it against `previous`.
    ///
    /// A failure that affects the whole family is an `Err`. A failure
    /// confined to one source of several goes into
    /// [`Observation::errors`], and that source's stored record is carried
    /// over unchanged.
    async fn observe(&self, previous: &Snapshot) -> Result<Observation>;
}

/// Load, observe, persist. Never returns an error.
pub async fn run_detector(detector: &dyn ChangeDetector, store: &SnapshotStore) -> Detection {
    let family = detector.family();
    let previous = match store.load(family) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(%family, error = %e, "snapshot unreadable");
            return Detection::Failed {
                error: format!("Error loading {family} snapshot: {e}"),
            };
        }
    };

    let observation = match detector.observe(&previous).await {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(%family, error = %e, transient = e.is_transient(), "check failed");
            return Detection::Failed {
                error: format!("Error checking {family}: {e}"),
            };
        }
    };

    if observation.snapshot != previous {
        if let Err(e) = store.save(family, &observation.snapshot) {
            tracing::warn!(%family, error = %e, "snapshot not saved");
            return Detection::Failed {
                error: format!("Error saving {family} snapshot: {e}"),
            };
        }
    }

    if !observation.errors.is_empty() {
        tracing::warn!(%family, failed = observation.errors.len(), "some sources not checked");
        let errors = observation
            .errors
            .iter()
            .map(|e| format!("Error checking {family}: {e}"))
            .collect();
        return Detection::Partial {
            report: observation.report,
            errors,
        };
    }

    match observation.report {
        Some(report) => {
            tracing::info!(%family, chars = report.len(), "change detected");
            Detection::Changed { report }
        }
        None => {
            tracing::debug!(%family, "no change");
            Detection::Unchanged
        }
    }
}
