//! File-sync repository detector.

use super::sources::SyncRepoSource;
use super::{ChangeDetector, Observation};
use crate::error::{HeraldError, Result};
use crate::store::{Snapshot, SourceFamily, SourceRecord};
use async_trait::async_trait;
use herald_sources::{RepoMetadata, RevisionChangelog};

/// Snapshot record id for the repository.
pub const REPO_SOURCE: &str = "repo";

/// Watches the repository revision and renders the revision's changelog.
pub struct SyncRepoDetector<S> {
    source: S,
}

impl<S: SyncRepoSource> SyncRepoDetector<S> {
    /// Detector over `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

/// Bytes to gigabytes, rounded to two decimals.
fn gigabytes(bytes: u64) -> f64 {
    (bytes as f64 / 1e9 * 100.0).round() / 100.0
}

/// Markdown block describing one revision.
pub fn render_report(meta: &RepoMetadata, changelog: &RevisionChangelog, previous_size: u64) -> String {
    let size = gigabytes(meta.total_size_bytes);
    let delta = ((size - gigabytes(previous_size)) * 100.0).round() / 100.0;
    format!(
        "```md\n# The mod repository has changed #\n\n[{size:.2} GB]({delta:+.2} GB)\n\n\
         < Updated >\n{}\n\n< Added >\n{}\n\n< Removed >\n{}```",
        changelog.updated_addons.join("\n"),
        changelog.new_addons.join("\n"),
        changelog.deleted_addons.join("\n"),
    )
}

#[async_trait]
impl<S: SyncRepoSource> ChangeDetector for SyncRepoDetector<S> {
    fn family(&self) -> SourceFamily {
        SourceFamily::SyncRepo
    }

    async fn observe(&self, previous: &Snapshot) -> Result<Observation> {
        let meta = self.source.fetch().await?;
        let stored = previous.get(REPO_SOURCE);
        let stored_revision = stored
            .and_then(|r| r.revision.as_deref())
            .and_then(|v| v.parse::<u64>().ok());

        let report = match stored_revision {
            Some(old) if meta.revision <= old => {
                tracing::debug!(revision = meta.revision, stored = old, "sync repo not newer");
                return Ok(Observation::unchanged(previous));
            }
            Some(_) => {
                let changelog = meta.current_changelog().ok_or_else(|| {
                    HeraldError::Parse(format!("no changelog for revision {}", meta.revision))
                })?;
                let previous_size = stored.map_or(0, |r| r.size_bytes);
                Some(render_report(&meta, changelog, previous_size))
            }
            None => {
                tracing::info!(revision = meta.revision, "sync repo first seen");
                None
            }
        };

        let mut next = previous.clone();
        next.sources.insert(
            REPO_SOURCE.to_owned(),
            SourceRecord {
                revision: Some(meta.revision.to_string()),
                size_bytes: meta.total_size_bytes,
                items: Default::default(),
            },
        );
        Ok(Observation {
            snapshot: next,
            report,
            errors: Vec::new(),
        })
    }
}
