//! Error types for the herald-sources crate.
//!
//! Messages never contain API tokens; request URLs are included only
//! when they carry no credentials.

/// Errors that can occur while talking to an upstream API.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request could not be sent or the response body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The upstream answered with an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The upstream payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SourceError {
    /// Build a [`SourceError::Status`] from a failed response, keeping at most
    /// 200 characters of its body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(200).collect();
        Self::Status { status, body }
    }
}

/// Convenience type alias for herald-sources results.
pub type Result<T> = std::result::Result<T, SourceError>;
