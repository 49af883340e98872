//! GitHub release feed detector.
//!
//! Per mod the snapshot keeps the `Last-Modified` value of the last accepted
//! response as `revision` and the release tag under the `tag` item. A first
//! sighting is recorded without a report. A feed that cannot be fetched keeps
//! its stored record and is listed in [`Observation::errors`]; the other
//! feeds are still checked.

use super::sources::ReleaseSource;
use super::{ChangeDetector, Observation};
use crate::error::Result;
use crate::store::{Snapshot, SourceFamily};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use herald_sources::ReleaseLookup;
use std::collections::BTreeMap;
use std::fmt::Write as _;

const TAG_ITEM: &str = "tag";

/// Watches the latest release of every configured mod.
pub struct ReleaseFeedDetector<S> {
    source: S,
    feeds: BTreeMap<String, String>,
}

impl<S: ReleaseSource> ReleaseFeedDetector<S> {
    /// `feeds` maps mod name → `owner/repo`.
    pub fn new(source: S, feeds: BTreeMap<String, String>) -> Self {
        Self { source, feeds }
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value).ok()
}

/// `true` unless both dates parse and `new` is not after `old`.
fn is_newer(new: Option<&str>, old: Option<&str>) -> bool {
    match (new.and_then(parse_http_date), old.and_then(parse_http_date)) {
        (Some(n), Some(o)) => n > o,
        _ => true,
    }
}

#[async_trait]
impl<S: ReleaseSource> ChangeDetector for ReleaseFeedDetector<S> {
    fn family(&self) -> SourceFamily {
        SourceFamily::ReleaseFeed
    }

    async fn observe(&self, previous: &Snapshot) -> Result<Observation> {
        let mut next = previous.clone();
        next.sources.retain(|name, _| self.feeds.contains_key(name));
        let mut report = String::new();
        let mut errors = Vec::new();

        for (mod_name, repo) in &self.feeds {
            let stored = previous.get(mod_name);
            let since = stored.and_then(|r| r.revision.as_deref());

            let lookup = match self.source.latest_release(repo, since).await {
                Ok(lookup) => lookup,
                Err(e) => {
                    tracing::warn!(mod_name, repo, error = %e, "release feed check failed");
                    errors.push(format!("{mod_name} ({repo}): {e}"));
                    continue;
                }
            };
            let (release, last_modified) = match lookup {
                ReleaseLookup::NotModified => {
                    tracing::trace!(mod_name, "release feed not modified");
                    continue;
                }
                ReleaseLookup::Modified {
                    release,
                    last_modified,
                } => (release, last_modified),
            };

            if !is_newer(last_modified.as_deref(), since) {
                tracing::debug!(mod_name, ?last_modified, "release feed not newer than snapshot");
                continue;
            }

            let record = next.entry(mod_name);
            if last_modified.is_some() {
                record.revision = last_modified;
            }
            let previous_tag = record
                .items
                .insert(TAG_ITEM.to_owned(), release.tag_name.clone());

            match previous_tag {
                None => tracing::info!(mod_name, tag = %release.tag_name, "release feed first seen"),
                Some(old) if old == release.tag_name => {}
                Some(_) => {
                    let link = release
                        .html_url
                        .clone()
                        .unwrap_or_else(|| self.source.release_page_url(repo, &release.tag_name));
                    let _ = write!(
                        report,
                        "**{mod_name}** has released a new version ({})\n<{link}>\n",
                        release.tag_name
                    );
                }
            }
        }

        Ok(Observation {
            snapshot: next,
            report: (!report.is_empty()).then_some(report),
            errors,
        })
    }
}
