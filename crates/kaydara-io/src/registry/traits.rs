//! Format reader trait and decode options.

use crate::error::Result;
use crate::scene::UnifiedScene;
use serde::{Deserialize, Serialize};

/// Trait for format readers.
///
/// Implement this trait to add support for reading a new file format.
pub trait FormatReader: Send + Sync {
    /// Get the format name (e.g., "fbx").
    fn name(&self) -> &'static str;

    /// Get supported file extensions (e.g., ["fbx"]).
    fn extensions(&self) -> &[&'static str];

    /// Check if this reader can handle the given data.
    ///
    /// This should be a fast check (e.g., magic bytes) without parsing the whole file.
    fn can_read(&self, data: &[u8]) -> bool;

    /// Read the data and convert to UnifiedScene.
    fn read(&self, data: &[u8], options: &ReadOptions) -> Result<UnifiedScene>;
}

/// Options for reading files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Compute normals for meshes without a normal layer.
    pub compute_normals: bool,
    /// Whether the consumer can decode `.tga` images.
    pub tga_supported: bool,
    /// Viewport width and height used when a camera has no aspect data.
    pub viewport: [f32; 2],
    /// Replace the root with its only child when that child is a group.
    pub collapse_root: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            compute_normals: false,
            tga_supported: false,
            viewport: [1920.0, 1080.0],
            collapse_root: true,
        }
    }
}

impl ReadOptions {
    /// Create default read options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate normals where the file has none.
    pub fn with_computed_normals(mut self) -> Self {
        self.compute_normals = true;
        self
    }

    /// Declare TGA support.
    pub fn with_tga_support(mut self, supported: bool) -> Self {
        self.tga_supported = supported;
        self
    }

    /// Set the fallback viewport size.
    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport = [width, height];
        self
    }

    /// Keep the synthetic root even when it has a single group child.
    pub fn without_root_collapse(mut self) -> Self {
        self.collapse_root = false;
        self
    }
}
