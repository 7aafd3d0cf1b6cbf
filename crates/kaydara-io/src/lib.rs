//! Scene reconstruction for FBX files.
//!
//! Bytes go through the tree builders in `kaydara-parser`, then a fixed
//! sequence of passes turns the generic tree into a [`UnifiedScene`]:
//! textures, materials, deformers, geometry, models, animation.
//!
//! # Example
//!
//! ```ignore
//! use kaydara_io::{read, ReadOptions};
//!
//! let bytes = std::fs::read("character.fbx")?;
//! let scene = read(&bytes, &ReadOptions::default())?;
//! for clip in &scene.animations {
//!     println!("{} ({:.2}s)", clip.name, clip.duration);
//! }
//! ```

pub mod error;
pub mod formats;
pub mod registry;
pub mod scene;

pub use error::{IoError, Result};
pub use registry::{FormatReader, FormatRegistry, ReadOptions};
pub use scene::*;

#[cfg(feature = "fbx")]
pub use formats::fbx::{decode, decode_tree, FbxReader};

/// Read a file, detecting its format from the content.
pub fn read(data: &[u8], options: &ReadOptions) -> Result<UnifiedScene> {
    default_registry().read(data, options)
}

/// Read a file using its extension to pick the reader.
pub fn read_with_extension(data: &[u8], extension: &str, options: &ReadOptions) -> Result<UnifiedScene> {
    default_registry().read_with_extension(data, extension, options)
}

fn default_registry() -> FormatRegistry {
    FormatRegistry::with_defaults()
}
