//! Core types for FBX documents.
//!
//! This crate provides the format-agnostic layer shared by the tree builders
//! and the scene reconstructors:
//! - Typed property values read from a node's property list
//! - The generic node tree (`FbxTree`) with tolerant child multiplicity
//! - The bidirectional connection graph resolved from the `Connections` section
//! - Error types

pub mod connections;
pub mod errors;
pub mod property;
pub mod tree;

pub use connections::*;
pub use errors::*;
pub use property::*;
pub use tree::*;
