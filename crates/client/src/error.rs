//! Engine error taxonomy.
//!
//! None of these are fatal. The session controller receives them as plain
//! `Result`s and decides whether to log and carry on.

use gupshup_shared::{ApiError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A frame was sent while the connection was not open. The frame is dropped.
    #[error("not connected")]
    NotConnected,
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("remote profile unavailable: {0}")]
    RemoteProfileUnavailable(String),
    #[error("local storage error: {0}")]
    Storage(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ProtocolError> for EngineError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MalformedFrame { reason } => EngineError::MalformedFrame(reason),
            ProtocolError::Encode(reason) => EngineError::Encode(reason),
        }
    }
}

impl EngineError {
    pub fn upload(err: ApiError) -> Self {
        EngineError::UploadFailed(err.to_string())
    }

    pub fn remote_profile(err: ApiError) -> Self {
        EngineError::RemoteProfileUnavailable(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
