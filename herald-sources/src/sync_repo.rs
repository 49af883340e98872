//! File-sync repository metadata.
//!
//! The repository publishes a JSON rendition of its server info and
//! changelogs. Only the fields needed for change detection are decoded.

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::http;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Addon changes recorded for one repository revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionChangelog {
    /// Revision this entry describes.
    pub revision: u64,
    /// Addons whose content changed.
    #[serde(default)]
    pub updated_addons: Vec<String>,
    /// Addons added in this revision.
    #[serde(default)]
    pub new_addons: Vec<String>,
    /// Addons removed in this revision.
    #[serde(default)]
    pub deleted_addons: Vec<String>,
}

/// Parsed repository metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMetadata {
    /// Current repository revision.
    pub revision: u64,
    /// Total size of all files in bytes.
    pub total_size_bytes: u64,
    /// Changelog entries keyed by revision.
    pub changelogs: BTreeMap<u64, RevisionChangelog>,
}

impl RepoMetadata {
    /// Changelog for the current revision, if the repository published one.
    pub fn current_changelog(&self) -> Option<&RevisionChangelog> {
        self.changelogs.get(&self.revision)
    }
}

#[derive(Deserialize)]
struct RawDocument {
    serverinfo: RawServerInfo,
    #[serde(default)]
    changelog: BTreeMap<String, RevisionChangelog>,
}

#[derive(Deserialize)]
struct RawServerInfo {
    #[serde(rename = "SERVER_INFO")]
    server_info: RawServerFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerFields {
    revision: u64,
    total_files_size: u64,
}

/// Parse the metadata document.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] when required fields are missing or have
/// the wrong type.
pub fn parse_metadata(body: &str) -> Result<RepoMetadata, SourceError> {
    let raw: RawDocument = serde_json::from_str(body)
        .map_err(|e| SourceError::Parse(format!("sync repo metadata: {e}")))?;
    let changelogs = raw
        .changelog
        .into_values()
        .map(|entry| (entry.revision, entry))
        .collect();
    Ok(RepoMetadata {
        revision: raw.serverinfo.server_info.revision,
        total_size_bytes: raw.serverinfo.server_info.total_files_size,
        changelogs,
    })
}

/// Fetches the repository metadata document.
pub struct SyncRepoClient {
    client: reqwest::Client,
    metadata_url: String,
}

impl SyncRepoClient {
    /// Create a client for the metadata document at `metadata_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] for a blank URL, or an HTTP error if
    /// the client cannot be built.
    pub fn new(config: &SourcesConfig, metadata_url: impl Into<String>) -> Result<Self, SourceError> {
        let metadata_url = metadata_url.into();
        if metadata_url.trim().is_empty() {
            return Err(SourceError::Config("sync repo metadata url is empty".into()));
        }
        Ok(Self {
            client: http::build_client(config)?,
            metadata_url,
        })
    }

    /// Download and parse the current metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or payload failures.
    pub async fn fetch(&self) -> Result<RepoMetadata, SourceError> {
        let response = self
            .client
            .get(&self.metadata_url)
            .send()
            .await
            .map_err(|e| SourceError::Http(format!("sync repo request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SourceError::from_response(response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(format!("sync repo read failed: {e}")))?;
        parse_metadata(&body)
    }
}
