//! GitHub "latest release" lookups with conditional requests.
//!
//! Each lookup may carry the `Last-Modified` value returned by the previous
//! successful lookup. GitHub answers `304 Not Modified` when nothing changed,
//! which does not count against the rate limit.

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::http;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, IF_MODIFIED_SINCE, LAST_MODIFIED};
use serde::Deserialize;

/// Public GitHub REST API root.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Public GitHub web root, used to build release page links.
pub const GITHUB_WEB_BASE: &str = "https://github.com";

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Tag the release was cut from (e.g. `v3.16.1`).
    pub tag_name: String,
    /// Release page URL, when GitHub includes it.
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Outcome of a conditional latest-release lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseLookup {
    /// Nothing changed since the supplied `If-Modified-Since` value.
    NotModified,
    /// The resource changed (or no condition was supplied).
    Modified {
        /// The latest release.
        release: Release,
        /// `Last-Modified` header to send with the next lookup.
        last_modified: Option<String>,
    },
}

/// Client for `GET /repos/{owner}/{repo}/releases/latest`.
pub struct ReleaseFeedClient {
    client: reqwest::Client,
    api_base: String,
    web_base: String,
    token: Option<String>,
}

impl ReleaseFeedClient {
    /// Create a client against the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SourcesConfig, token: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: http::build_client(config)?,
            api_base: GITHUB_API_BASE.to_owned(),
            web_base: GITHUB_WEB_BASE.to_owned(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Point the client at a different API root (GitHub Enterprise, tests).
    #[must_use]
    pub fn with_api_base(mut self, base: impl AsRef<str>) -> Self {
        self.api_base = http::trim_base(base.as_ref());
        self
    }

    /// Link to the human-readable page of a release.
    pub fn release_page_url(&self, repo: &str, tag: &str) -> String {
        format!("{}/{repo}/releases/tag/{tag}", self.web_base)
    }

    /// Fetch the latest release of `repo` (`owner/name`).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] on transport failures,
    /// [`SourceError::Status`] for any status other than 200/304 and
    /// [`SourceError::Parse`] for a malformed body.
    pub async fn latest_release(
        &self,
        repo: &str,
        if_modified_since: Option<&str>,
    ) -> Result<ReleaseLookup, SourceError> {
        let url = format!("{}/repos/{repo}/releases/latest", self.api_base);
        tracing::trace!(repo, ?if_modified_since, "latest release lookup");

        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(since) = if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Http(format!("GitHub request for {repo} failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(ReleaseLookup::NotModified),
            StatusCode::OK => {
                let last_modified = response
                    .headers()
                    .get(LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let body = response.text().await.map_err(|e| {
                    SourceError::Http(format!("GitHub response read for {repo} failed: {e}"))
                })?;
                let release: Release = serde_json::from_str(&body).map_err(|e| {
                    SourceError::Parse(format!("GitHub release payload for {repo}: {e}"))
                })?;
                Ok(ReleaseLookup::Modified {
                    release,
                    last_modified,
                })
            }
            _ => Err(SourceError::from_response(response).await),
        }
    }
}
