//! Format readers.

#[cfg(feature = "fbx")]
pub mod fbx;
