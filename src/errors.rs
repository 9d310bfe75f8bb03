//! Error types for the price pipeline

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised anywhere between the feed and the strategy.
///
/// Only `ConnectInit` is fatal. Everything else is scoped to a single event or
/// job and gets logged by the loop that hit it.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Could not reach an external backend during startup
    #[error("Failed to connect to {backend}: {reason}")]
    ConnectInit { backend: String, reason: String },

    /// Message log rejected the publish after all retries
    #[error("Publish error: {0}")]
    Publish(String),

    /// Message log read failed
    #[error("Consume error: {0}")]
    Consume(String),

    /// Store read or write failed
    #[error("Cache read/write error: {0}")]
    CacheReadWrite(String),

    /// A price string was not a number
    #[error("Invalid price '{value}': {reason}")]
    Parse { value: String, reason: String },

    /// Market data feed transport failure
    #[error("Feed error: {0}")]
    Feed(String),

    /// Bad environment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workers did not drain before the deadline
    #[error("Shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}

impl PipelineError {
    pub fn connect_init(backend: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::ConnectInit {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error should stop the process rather than the current job
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::ConnectInit { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PipelineError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        PipelineError::Feed(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Feed(format!("malformed frame: {}", err))
    }
}
