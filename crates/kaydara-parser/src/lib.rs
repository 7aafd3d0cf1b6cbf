//! Tree builders for FBX documents.
//!
//! Two independent front ends produce the same `FbxTree` shape:
//! - `BinaryParser` for files starting with the `Kaydara FBX Binary` magic
//! - `TextParser` for ASCII files (version 7000 and later)
//!
//! # Example
//!
//! ```ignore
//! use kaydara_parser::parse;
//!
//! let tree = parse(&bytes)?;
//! for model in tree.objects_of("Model") {
//!     println!("{:?}", model.attr_name);
//! }
//! ```

mod binary;
mod lexer;
mod reader;
mod text;

pub use binary::{BinaryParser, BINARY_MAGIC};
pub use reader::{BinaryReader, ByteOrder};
pub use text::{ascii_version, TextParser};

use kaydara_core::{FbxError, FbxTree, Result};

/// How much of a text file is searched for the version header.
const HEADER_SCAN_LEN: usize = 4096;

/// Returns true when the data starts with the binary magic.
pub fn is_binary(data: &[u8]) -> bool {
    data.starts_with(BINARY_MAGIC)
}

/// Returns true when the data looks like an ASCII FBX document.
///
/// The text must not carry the binary magic, must open with a `;` comment
/// or an `FBXHeaderExtension` block, and must mention `FBXVersion` near the
/// start.
pub fn is_ascii(data: &[u8]) -> bool {
    if is_binary(data) {
        return false;
    }
    let head = &data[..data.len().min(HEADER_SCAN_LEN)];
    let text = String::from_utf8_lossy(head);
    let start = text.trim_start_matches('\u{feff}').trim_start();
    (start.starts_with(';') || start.starts_with("FBXHeaderExtension"))
        && text.contains("FBXVersion")
}

/// Build a tree from either variant, detected by signature.
pub fn parse(data: &[u8]) -> Result<FbxTree> {
    if is_binary(data) {
        return BinaryParser::new(data).parse();
    }

    if !is_ascii(data) {
        return Err(FbxError::InvalidSignature {
            reason: "neither the binary magic nor an ASCII FBX header was found".into(),
        });
    }

    let text = std::str::from_utf8(data).map_err(|e| FbxError::InvalidSignature {
        reason: format!("ASCII document is not valid UTF-8: {}", e),
    })?;
    TextParser::new(text).parse()
}
