//! FBX scene reconstruction.
//!
//! Both file variants are first built into a `kaydara_core::FbxTree` by
//! `kaydara_parser`; everything here works on that tree and its connection
//! map, so binary and ASCII input produce the same scene.
//!
//! The passes run in dependency order:
//!
//! 1. images and textures
//! 2. materials
//! 3. deformers (skins, blend shapes) and bind poses
//! 4. geometries
//! 5. models, hierarchy, transforms and skin bindings
//! 6. animation clips

mod animation;
mod context;
mod deformers;
mod geometry;
mod materials;
mod models;
mod nurbs;
mod reader;
mod textures;
mod transform;

pub use reader::{decode, decode_tree, FbxReader};

#[cfg(test)]
pub(crate) mod test_util {
    use kaydara_core::FbxTree;

    const HEADER: &str = "; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n\tFBXVersion: 7400\n}\n";

    /// Parse an ASCII document body behind a 7.4 header.
    pub fn parse_doc(body: &str) -> FbxTree {
        let text = format!("{}{}", HEADER, body);
        kaydara_parser::parse(text.as_bytes()).unwrap()
    }
}
