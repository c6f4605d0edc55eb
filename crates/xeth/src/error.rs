//! Error types for the xeth core

use thiserror::Error;

/// Reasons a driver message was rejected before reaching the reconciler
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Buffer shorter than the fixed record for its kind
    #[error("message too short for kind {kind}: need {want} bytes, got {got}")]
    Truncated { kind: u8, want: usize, got: usize },

    /// Header padding not zero or protocol version mismatch
    #[error("invalid message header (version {version}, kind {kind})")]
    BadHeader { version: u8, kind: u8 },

    #[error("unknown device kind {0}")]
    UnknownDevKind(u8),

    #[error("unknown ifinfo reason {0}")]
    UnknownReason(u8),

    /// Underlying binary reader/writer failure
    #[error("binary codec error: {0}")]
    Binary(#[from] binrw::Error),
}

/// Errors surfaced by the xeth core
#[derive(Debug, Error)]
pub enum XethError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type for xeth core operations
pub type Result<T> = std::result::Result<T, XethError>;
