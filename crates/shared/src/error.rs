//! Shared error types.

use thiserror::Error;

/// Failures of the frame codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// An inbound frame could not be parsed. It is dropped, never retried.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },
    #[error("failed to encode intent: {0}")]
    Encode(String),
}

/// Error type for the HTTP collaborators (profile store, media uploader).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}
