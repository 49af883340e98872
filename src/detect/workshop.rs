//! Steam workshop collection detector.
//!
//! The root collection is expanded recursively into a deduplicated item set.
//! Visited collections are tracked so cycles terminate. Item timestamps are
//! kept in the snapshot record named after the root collection. An item
//! still in the collection but missing from the details response keeps its
//! stored timestamp; only items no longer reachable are dropped.

use super::sources::WorkshopSource;
use super::{ChangeDetector, Observation};
use crate::error::Result;
use crate::store::{Snapshot, SourceFamily, SourceRecord};
use async_trait::async_trait;
use herald_sources::ChildKind;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

/// Shown in place of a changelog that could not be scraped.
pub const CHANGELOG_FALLBACK: &str = "Error retrieving changelog";

/// Watches every item reachable from one workshop collection.
pub struct WorkshopDetector<S> {
    source: S,
    collection_id: String,
}

impl<S: WorkshopSource> WorkshopDetector<S> {
    /// Detector rooted at `collection_id`.
    pub fn new(source: S, collection_id: impl Into<String>) -> Self {
        Self {
            source,
            collection_id: collection_id.into(),
        }
    }

    /// All item ids reachable from the root, each once.
    ///
    /// # Errors
    ///
    /// Fails if any collection lookup fails.
    pub async fn expand(&self) -> Result<BTreeSet<String>> {
        let mut items = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut pending = vec![self.collection_id.clone()];

        while let Some(collection) = pending.pop() {
            if !visited.insert(collection.clone()) {
                continue;
            }
            for child in self.source.collection_children(&collection).await? {
                match child.kind {
                    ChildKind::Item => {
                        items.insert(child.id);
                    }
                    ChildKind::Collection => pending.push(child.id),
                    ChildKind::Other => {}
                }
            }
        }

        tracing::debug!(
            root = %self.collection_id,
            collections = visited.len(),
            items = items.len(),
            "workshop collection expanded"
        );
        Ok(items)
    }
}

#[async_trait]
impl<S: WorkshopSource> ChangeDetector for WorkshopDetector<S> {
    fn family(&self) -> SourceFamily {
        SourceFamily::Workshop
    }

    async fn observe(&self, previous: &Snapshot) -> Result<Observation> {
        let reachable = self.expand().await?;
        let ids: Vec<String> = reachable.iter().cloned().collect();
        let files = self.source.published_file_details(&ids).await?;
        if files.len() < ids.len() {
            tracing::debug!(
                requested = ids.len(),
                returned = files.len(),
                "workshop details incomplete, keeping stored timestamps"
            );
        }

        let stored = previous.get(&self.collection_id);
        let mut record = SourceRecord {
            revision: stored.and_then(|r| r.revision.clone()),
            size_bytes: stored.map_or(0, |r| r.size_bytes),
            items: stored
                .map(|r| {
                    r.items
                        .iter()
                        .filter(|(id, _)| reachable.contains(id.as_str()))
                        .map(|(id, t)| (id.clone(), t.clone()))
                        .collect()
                })
                .unwrap_or_default(),
        };
        let mut report = String::new();

        for file in files {
            let seen = stored
                .and_then(|r| r.items.get(&file.id))
                .and_then(|v| v.parse::<i64>().ok());
            let keep = match seen {
                None => {
                    tracing::debug!(id = %file.id, title = %file.title, "workshop item first seen");
                    file.time_updated
                }
                Some(old) if file.time_updated > old => {
                    let changelog = match self.source.changelog_excerpt(&file.id).await {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(id = %file.id, error = %e, "changelog unavailable");
                            CHANGELOG_FALLBACK.to_owned()
                        }
                    };
                    let _ = write!(
                        report,
                        "**{}** has released a new version\n<{}>\n```\n{changelog}```\n",
                        file.title,
                        self.source.changelog_url(&file.id)
                    );
                    file.time_updated
                }
                Some(old) => old,
            };
            record.items.insert(file.id, keep.to_string());
        }

        let mut next = previous.clone();
        next.sources.clear();
        next.sources.insert(self.collection_id.clone(), record);

        Ok(Observation {
            snapshot: next,
            report: (!report.is_empty()).then_some(report),
            errors: Vec::new(),
        })
    }
}
