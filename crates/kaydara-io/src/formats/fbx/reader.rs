//! FBX reader: tree building plus every reconstruction pass.

use indexmap::IndexMap;
use kaydara_core::{AttributeValue, FbxTree, SourceFormat};
use log::debug;

use super::animation::parse_animations;
use super::context::DecodeContext;
use super::deformers::parse_deformers;
use super::geometry::parse_geometries;
use super::materials::parse_materials;
use super::models::{build_scene, finish_root};
use super::textures::{parse_images, parse_textures};
use crate::error::Result;
use crate::registry::{FormatReader, ReadOptions};
use crate::scene::{Axis, SceneMetadata, UnifiedScene, Units};

/// FBX format reader for binary and ASCII files.
#[derive(Debug, Default)]
pub struct FbxReader;

impl FbxReader {
    /// Create a new FBX reader.
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for FbxReader {
    fn name(&self) -> &'static str {
        "fbx"
    }

    fn extensions(&self) -> &[&'static str] {
        &["fbx"]
    }

    fn can_read(&self, data: &[u8]) -> bool {
        kaydara_parser::is_binary(data) || kaydara_parser::is_ascii(data)
    }

    fn read(&self, data: &[u8], options: &ReadOptions) -> Result<UnifiedScene> {
        decode(data, options)
    }
}

/// Decode FBX bytes into a scene.
pub fn decode(data: &[u8], options: &ReadOptions) -> Result<UnifiedScene> {
    let tree = kaydara_parser::parse(data)?;
    decode_tree(&tree, options)
}

/// Reconstruct a scene from an already built tree.
pub fn decode_tree(tree: &FbxTree, options: &ReadOptions) -> Result<UnifiedScene> {
    let ctx = DecodeContext::new(tree, options);
    let mut scene = UnifiedScene::new();
    scene.metadata = scene_metadata(tree);
    scene.extensions.fbx = global_settings(tree);

    let images = parse_images(&ctx)?;
    let textures = parse_textures(&ctx, &images, &mut scene);
    let materials = parse_materials(&ctx, &textures, &mut scene);
    let deformers = parse_deformers(&ctx);
    let geometries = parse_geometries(&ctx, &deformers, &mut scene);
    let models = build_scene(&ctx, &deformers, &geometries, &materials, &mut scene);
    scene.animations = parse_animations(&ctx, &models, &scene);
    finish_root(&mut scene, options.collapse_root);

    debug!(
        "Decoded FBX {}: {} nodes, {} geometries, {} materials, {} clips",
        tree.version,
        scene.node_count(),
        scene.geometry_count(),
        scene.materials.len(),
        scene.animations.len()
    );
    Ok(scene)
}

/// Frames per second for a `TimeMode` value.
fn frame_rate_for_time_mode(mode: i64) -> Option<f64> {
    let fps = match mode {
        1 => 120.0,
        2 => 100.0,
        3 => 60.0,
        4 => 50.0,
        5 => 48.0,
        6 | 7 => 30.0,
        8 | 9 => 29.97,
        10 => 25.0,
        11 => 24.0,
        12 => 1000.0,
        13 => 23.976,
        15 => 96.0,
        16 => 72.0,
        17 => 59.94,
        18 => 119.88,
        _ => return None,
    };
    Some(fps)
}

fn scene_metadata(tree: &FbxTree) -> SceneMetadata {
    let mut metadata = SceneMetadata {
        source_format: Some(
            match tree.format {
                SourceFormat::Binary => "fbx-binary",
                SourceFormat::Ascii => "fbx-ascii",
            }
            .to_string(),
        ),
        version: Some(tree.version),
        ..Default::default()
    };

    metadata.generator = tree
        .get("Creator")
        .and_then(|n| n.properties.first())
        .and_then(|p| p.as_str())
        .or_else(|| tree.get("FBXHeaderExtension").and_then(|h| h.value_str("Creator")))
        .map(str::to_string);

    let Some(settings) = tree.get("GlobalSettings") else {
        return metadata;
    };

    if let Some(axis) = settings
        .attribute("UpAxis")
        .and_then(|a| a.as_i64())
        .and_then(Axis::from_code)
    {
        metadata.up_axis = axis;
    }
    if let Some(factor) = settings.attr_f64("UnitScaleFactor") {
        metadata.units = Units::from_scale_factor(factor);
        metadata.unit_scale_factor = Some(factor);
    }

    metadata.frame_rate = settings
        .attr_f64("CustomFrameRate")
        .filter(|fps| *fps > 0.0)
        .or_else(|| {
            settings
                .attribute("TimeMode")
                .and_then(|a| a.as_i64())
                .and_then(frame_rate_for_time_mode)
        });

    metadata
}

/// `GlobalSettings` values as JSON, keyed by property name.
fn global_settings(tree: &FbxTree) -> IndexMap<String, serde_json::Value> {
    let Some(settings) = tree.get("GlobalSettings") else {
        return IndexMap::new();
    };
    settings
        .attributes
        .iter()
        .map(|(name, attribute)| {
            let value = match &attribute.value {
                AttributeValue::Number(n) => serde_json::json!(n),
                AttributeValue::Vector(v) => serde_json::json!(v),
                AttributeValue::Text(s) => serde_json::json!(s),
                AttributeValue::Empty => serde_json::Value::Null,
            };
            (name.clone(), value)
        })
        .collect()
}
