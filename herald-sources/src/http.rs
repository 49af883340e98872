//! Shared HTTP client construction.

use crate::config::SourcesConfig;
use crate::error::SourceError;
use std::time::Duration;

/// Build a [`reqwest::Client`] for upstream API requests.
///
/// # Errors
///
/// Returns [`SourceError::Config`] for an invalid configuration and
/// [`SourceError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SourcesConfig) -> Result<reqwest::Client, SourceError> {
    config.validate()?;
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SourceError::Http(format!("failed to build HTTP client: {e}")))
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_owned()
}
