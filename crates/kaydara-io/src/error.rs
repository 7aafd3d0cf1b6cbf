//! Error types for kaydara-io.

use kaydara_core::FbxError;
use thiserror::Error;

/// Result type for kaydara-io operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// Errors that can occur while decoding a scene.
#[derive(Debug, Error)]
pub enum IoError {
    /// Fatal error from the tree builders.
    #[error(transparent)]
    Fbx(#[from] FbxError),

    /// Unknown or unsupported file format.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// No reader available for the given format.
    #[error("no reader for format: {0}")]
    NoReader(String),

    /// Embedded image content that is not valid base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}
