//! Error types for FBX tree building.

use thiserror::Error;

/// Result type for tree-building operations.
pub type Result<T> = std::result::Result<T, FbxError>;

/// Fatal errors raised while turning bytes or text into an `FbxTree`.
///
/// Anything that can be recovered from (unknown shading models, odd texture
/// types, surplus skin weights) is logged by the reconstructors instead.
#[derive(Debug, Error)]
pub enum FbxError {
    #[error("Not an FBX file: {reason}")]
    InvalidSignature { reason: String },

    #[error("FBX version {version} is not supported (minimum {minimum})")]
    UnsupportedVersion { version: u32, minimum: u32 },

    #[error("Cannot find the FBXVersion header")]
    MissingVersion,

    #[error("Unknown property type '{tag}' at byte {offset}")]
    UnknownPropertyType { tag: char, offset: usize },

    #[error("Unexpected end of data at byte {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Node at byte {offset} ends at {end_offset}, past the end of data ({len})")]
    InvalidEndOffset {
        offset: usize,
        end_offset: u64,
        len: usize,
    },

    #[error("Unsupported array encoding {encoding} at byte {offset}")]
    UnsupportedEncoding { encoding: u32, offset: usize },

    #[error("Failed to inflate array at byte {offset}: {reason}")]
    Decompress { offset: usize, reason: String },

    #[error("Malformed line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}
