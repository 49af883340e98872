//! Error types for herald.

use herald_sources::SourceError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    /// Upstream unreachable or answered with an unexpected status.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be read or written.
    #[error("state error: {0}")]
    State(String),

    /// Message delivery failed.
    #[error("notify error: {0}")]
    Notify(String),

    /// Scheduler error (task registration, shutdown).
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl HeraldError {
    /// `true` for failures that may succeed on the next tick without any
    /// operator action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<SourceError> for HeraldError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Http(_) | SourceError::Status { .. } => Self::Network(err.to_string()),
            SourceError::Parse(msg) => Self::Parse(msg),
            SourceError::Config(msg) => Self::Config(msg),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HeraldError>;
