//! Error types for xethsyncd

use thiserror::Error;

/// Synchronization daemon errors
#[derive(Error, Debug)]
pub enum SyncdError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Capture source unreadable or malformed framing
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Xeth error: {0}")]
    Xeth(#[from] xeth::XethError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// A replay task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for xethsyncd operations
pub type Result<T> = std::result::Result<T, SyncdError>;
