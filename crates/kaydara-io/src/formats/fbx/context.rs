//! State shared by the reconstruction passes of one decode.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Display;

use glam::{Mat4, Vec3};
use kaydara_core::{ConnectionMap, FbxTree, Link, Node};
use log::warn;

use crate::registry::ReadOptions;

/// Read-only inputs of a decode plus its warn-once set.
pub(crate) struct DecodeContext<'a> {
    pub tree: &'a FbxTree,
    pub connections: ConnectionMap,
    pub options: &'a ReadOptions,
    warned: RefCell<HashSet<&'static str>>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(tree: &'a FbxTree, options: &'a ReadOptions) -> Self {
        Self {
            tree,
            connections: ConnectionMap::from_tree(tree),
            options,
            warned: RefCell::new(HashSet::new()),
        }
    }

    /// Log `message` the first time `key` is seen in this decode.
    pub fn warn_once(&self, key: &'static str, message: impl Display) {
        if self.warned.borrow_mut().insert(key) {
            warn!("{}", message);
        }
    }

    #[cfg(test)]
    pub fn has_warned(&self, key: &str) -> bool {
        self.warned.borrow().contains(key)
    }

    pub fn parents(&self, id: i64) -> &[Link] {
        self.connections.parents(id)
    }

    pub fn children(&self, id: i64) -> &[Link] {
        self.connections.children(id)
    }

    pub fn object(&self, kind: &str, id: i64) -> Option<&'a Node> {
        self.tree.object(kind, id)
    }

    pub fn model(&self, id: i64) -> Option<&'a Node> {
        self.object("Model", id)
    }
}

/// Convert one sRGB channel to linear.
pub(crate) fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

pub(crate) fn srgb_vec3_to_linear(c: Vec3) -> Vec3 {
    Vec3::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
}

/// A vector-valued `Properties70` entry.
pub(crate) fn attr_vec3(node: &Node, name: &str) -> Option<Vec3> {
    node.attr_vec3(name)
        .map(|[x, y, z]| Vec3::new(x as f32, y as f32, z as f32))
}

/// A column-major 4x4 matrix from a 16-element array.
pub(crate) fn mat4_from_slice(values: &[f64]) -> Option<Mat4> {
    if values.len() < 16 {
        return None;
    }
    let mut cols = [0.0f32; 16];
    for (dst, src) in cols.iter_mut().zip(values) {
        *dst = *src as f32;
    }
    Some(Mat4::from_cols_array(&cols))
}

/// Last path component of a Windows or Unix path.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Lower-cased extension of a file name.
pub(crate) fn extension(path: &str) -> Option<String> {
    let name = basename(path);
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaydara_core::SourceFormat;

    #[test]
    fn test_srgb_to_linear() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!((srgb_to_linear(0.5) - 0.214).abs() < 1e-3);
    }

    #[test]
    fn test_paths() {
        assert_eq!(basename("C:\\textures\\wood.PNG"), "wood.PNG");
        assert_eq!(basename("maps/wood.png"), "wood.png");
        assert_eq!(extension("C:\\textures\\wood.PNG").as_deref(), Some("png"));
        assert_eq!(extension("noext"), None);
    }

    #[test]
    fn test_matrix_needs_sixteen_values() {
        assert!(mat4_from_slice(&[1.0; 15]).is_none());
        let mut identity = vec![0.0; 16];
        for i in 0..4 {
            identity[i * 5] = 1.0;
        }
        assert_eq!(mat4_from_slice(&identity), Some(Mat4::IDENTITY));
    }

    #[test]
    fn test_warn_once_is_per_context() {
        let tree = FbxTree::new(7400, SourceFormat::Ascii);
        let options = ReadOptions::default();
        let ctx = DecodeContext::new(&tree, &options);
        ctx.warn_once("k", "first");
        ctx.warn_once("k", "second");
        assert_eq!(ctx.warned.borrow().len(), 1);

        let other = DecodeContext::new(&tree, &options);
        assert!(other.warned.borrow().is_empty());
    }
}
