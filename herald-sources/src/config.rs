//! Shared HTTP settings for every upstream client.

use crate::error::SourceError;

/// Default User-Agent. GitHub rejects requests without one.
pub const DEFAULT_USER_AGENT: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));

/// HTTP behaviour shared by all clients.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl SourcesConfig {
    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] when the timeout is zero or the
    /// User-Agent is blank.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.timeout_seconds == 0 {
            return Err(SourceError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SourceError::Config("user_agent must not be empty".into()));
        }
        Ok(())
    }
}
