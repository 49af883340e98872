//! "Next scheduled activities" lookup on the community hub API.

use crate::config::SourcesConfig;
use crate::error::SourceError;
use crate::http;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;

/// One activity scheduled for the next session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Activity {
    /// Hub id, used to build the activity link.
    pub id: u64,
    /// Name shown to members.
    pub display_name: String,
    /// Raw mode (`coop`, `adversarial`, `arcade`, ...).
    #[serde(default)]
    pub mode: String,
    /// Author.
    #[serde(default)]
    pub maker: String,
}

/// Client for `GET {base}/api/v1/operations/next`.
pub struct ActivityClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl ActivityClient {
    /// Create a client for the hub at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &SourcesConfig,
        api_base: impl AsRef<str>,
        token: Option<String>,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: http::build_client(config)?,
            api_base: http::trim_base(api_base.as_ref()),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Activities attached to the next scheduled session.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or payload failures.
    pub async fn next_activities(&self) -> Result<Vec<Activity>, SourceError> {
        let url = format!("{}/api/v1/operations/next", self.api_base);
        let mut request = self.client.get(&url).header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Http(format!("activities request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SourceError::from_response(response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(format!("activities read failed: {e}")))?;
        serde_json::from_str(&body).map_err(|e| SourceError::Parse(format!("activities: {e}")))
    }
}
