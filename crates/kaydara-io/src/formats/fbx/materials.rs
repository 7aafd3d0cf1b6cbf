//! `Material` objects.

use glam::Vec3;
use indexmap::IndexMap;
use kaydara_core::Node;
use log::{debug, warn};

use super::context::{attr_vec3, srgb_to_linear, srgb_vec3_to_linear, DecodeContext};
use crate::scene::{ColorSpace, MapSlot, Material, ShadingModel, TextureRef, UnifiedScene};

/// Name of the material given to meshes without one.
pub(crate) const DEFAULT_MATERIAL_NAME: &str = "__DEFAULT";

/// Build every connected `Material` object and return material id -> index.
pub(crate) fn parse_materials(
    ctx: &DecodeContext<'_>,
    textures: &IndexMap<i64, usize>,
    scene: &mut UnifiedScene,
) -> IndexMap<i64, usize> {
    let mut materials = IndexMap::new();
    for node in ctx.tree.objects_of("Material") {
        let Some(id) = node.numeric_id() else {
            continue;
        };
        if !ctx.connections.contains(id) {
            debug!("Skipping unused material {}", id);
            continue;
        }
        let material = parse_material(ctx, node, id, textures, scene);
        materials.insert(id, scene.add_material(material));
    }
    debug!("Parsed {} materials", materials.len());
    materials
}

/// Phong material used by meshes that have no material connection.
pub(crate) fn default_material() -> Material {
    Material::colored(DEFAULT_MATERIAL_NAME, Vec3::splat(srgb_to_linear(0.8)))
}

fn shading_model(node: &Node) -> ShadingModel {
    let name = node
        .value_str("ShadingModel")
        .or_else(|| node.attr_str("ShadingModel"))
        .unwrap_or("phong");
    match name.to_ascii_lowercase().as_str() {
        "phong" => ShadingModel::Phong,
        "lambert" => ShadingModel::Lambert,
        other => {
            warn!("Unknown material type \"{}\", defaulting to phong", other);
            ShadingModel::Phong
        }
    }
}

/// A color attribute, optionally restricted to color-typed entries.
fn color(node: &Node, name: &str, color_typed_only: bool) -> Option<Vec3> {
    let attribute = node.attribute(name)?;
    if color_typed_only && !matches!(attribute.type_name.as_str(), "Color" | "ColorRGB") {
        return None;
    }
    attr_vec3(node, name).map(srgb_vec3_to_linear)
}

fn parse_material(
    ctx: &DecodeContext<'_>,
    node: &Node,
    id: i64,
    textures: &IndexMap<i64, usize>,
    scene: &mut UnifiedScene,
) -> Material {
    let mut material = Material::new(node.attr_name.clone().unwrap_or_default());
    material.fbx_id = Some(id);
    material.shading = shading_model(node);

    let scalar = |name: &str| node.attr_f64(name).map(|v| v as f32);

    if let Some(v) = scalar("BumpFactor") {
        material.bump_scale = v;
    }
    if let Some(c) = color(node, "Diffuse", false).or_else(|| color(node, "DiffuseColor", true)) {
        material.color = c;
    }
    if let Some(v) = scalar("DisplacementFactor") {
        material.displacement_scale = v;
    }
    if let Some(c) = color(node, "Emissive", false).or_else(|| color(node, "EmissiveColor", true)) {
        material.emissive = c;
    }
    if let Some(v) = scalar("EmissiveFactor") {
        material.emissive_intensity = v;
    }
    if let Some(v) = scalar("Opacity") {
        material.opacity = v;
        if v < 1.0 {
            material.transparent = true;
        }
    }
    if let Some(v) = scalar("ReflectionFactor") {
        material.reflectivity = v;
    }
    if let Some(v) = scalar("Shininess") {
        material.shininess = v;
    }
    if let Some(c) = color(node, "Specular", false).or_else(|| color(node, "SpecularColor", true)) {
        material.specular = c;
    }

    for link in ctx.children(id) {
        let relationship = link.relationship.as_deref().unwrap_or_default();
        let (slot, color_space) = match relationship {
            "Bump" => (MapSlot::Bump, ColorSpace::Linear),
            "Maya|TEX_ao_map" => (MapSlot::AmbientOcclusion, ColorSpace::Linear),
            "DiffuseColor" | "Maya|TEX_color_map" => (MapSlot::Color, ColorSpace::Srgb),
            "DisplacementColor" => (MapSlot::Displacement, ColorSpace::Linear),
            "EmissiveColor" => (MapSlot::Emissive, ColorSpace::Srgb),
            "NormalMap" | "Maya|TEX_normal_map" => (MapSlot::Normal, ColorSpace::Linear),
            "ReflectionColor" => (MapSlot::Environment, ColorSpace::Srgb),
            "SpecularColor" => (MapSlot::Specular, ColorSpace::Srgb),
            "TransparentColor" | "TransparencyFactor" => (MapSlot::Alpha, ColorSpace::Linear),
            other => {
                if textures.contains_key(&link.id) || ctx.object("LayeredTexture", link.id).is_some() {
                    warn!("{} map is not supported, skipping texture", other);
                }
                continue;
            }
        };

        let Some(index) = texture_index(ctx, link.id, textures) else {
            continue;
        };
        if color_space == ColorSpace::Srgb {
            if let Some(texture) = scene.textures.get_mut(index) {
                texture.color_space = ColorSpace::Srgb;
            }
        }
        if slot == MapSlot::Alpha {
            material.transparent = true;
        }
        material.maps.insert(slot, TextureRef::new(index));
    }

    material
}

/// Texture index for a connected id; layered textures use their first layer.
fn texture_index(ctx: &DecodeContext<'_>, id: i64, textures: &IndexMap<i64, usize>) -> Option<usize> {
    let id = if ctx.object("LayeredTexture", id).is_some() {
        ctx.warn_once(
            "layered-texture",
            "Layered textures are not supported, discarding all but the first layer",
        );
        ctx.children(id).first()?.id
    } else {
        id
    };
    textures.get(&id).copied()
}
