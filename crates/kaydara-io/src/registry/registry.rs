//! Format registry for managing readers.

use crate::error::{IoError, Result};
use crate::scene::UnifiedScene;
use indexmap::IndexMap;

use super::traits::{FormatReader, ReadOptions};

/// Registry of format readers.
///
/// The registry manages format handlers and provides auto-detection
/// and extension lookup for reading files.
pub struct FormatRegistry {
    readers: IndexMap<String, Box<dyn FormatReader>>,
    extension_to_reader: IndexMap<String, String>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            readers: IndexMap::new(),
            extension_to_reader: IndexMap::new(),
        }
    }

    /// Create a registry with the built-in readers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "fbx")]
        registry.register_reader(crate::formats::fbx::FbxReader::new());

        registry
    }

    /// Register a format reader.
    pub fn register_reader<R: FormatReader + 'static>(&mut self, reader: R) {
        let name = reader.name().to_lowercase();

        for ext in reader.extensions() {
            self.extension_to_reader
                .insert(ext.to_lowercase(), name.clone());
        }

        self.readers.insert(name, Box::new(reader));
    }

    /// Get a reader by format name.
    pub fn get_reader(&self, format: &str) -> Option<&dyn FormatReader> {
        self.readers.get(&format.to_lowercase()).map(|r| r.as_ref())
    }

    /// Get a reader by file extension.
    pub fn reader_for_extension(&self, ext: &str) -> Option<&dyn FormatReader> {
        let ext_lower = ext.trim_start_matches('.').to_lowercase();
        let format = self.extension_to_reader.get(&ext_lower)?;
        self.get_reader(format)
    }

    /// List all registered reader format names.
    pub fn reader_formats(&self) -> impl Iterator<Item = &str> {
        self.readers.keys().map(String::as_str)
    }

    /// Read data with auto-detection.
    ///
    /// Tries each registered reader's `can_read` method to find a compatible format.
    pub fn read(&self, data: &[u8], options: &ReadOptions) -> Result<UnifiedScene> {
        for reader in self.readers.values() {
            if reader.can_read(data) {
                return reader.read(data, options);
            }
        }

        Err(IoError::UnknownFormat(
            "no reader recognized this format".into(),
        ))
    }

    /// Read data with file extension hint.
    pub fn read_with_extension(
        &self,
        data: &[u8],
        extension: &str,
        options: &ReadOptions,
    ) -> Result<UnifiedScene> {
        let reader = self
            .reader_for_extension(extension)
            .ok_or_else(|| IoError::NoReader(extension.into()))?;
        reader.read(data, options)
    }
}
