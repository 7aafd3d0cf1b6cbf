//! `Model` objects and assembly of the scene graph.

use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_PI_3;

use glam::{Mat4, Vec3};
use indexmap::IndexMap;
use kaydara_core::{Attribute, AttributeValue, Node};
use log::{debug, warn};

use super::context::{attr_vec3, srgb_vec3_to_linear, DecodeContext};
use super::deformers::{parse_bind_poses, Deformers};
use super::materials::default_material;
use super::transform::{euler_order_from_code, generate_transform};
use crate::scene::{
    Camera, Geometry, InheritType, Light, LightType, MetadataValue, NodeKind, Projection,
    SceneNode, Skin, TransformData, TriangleMesh, UnifiedScene,
};

/// Film gauge used to turn a focal length into a field of view, in mm.
const FILM_GAUGE: f32 = 35.0;

/// Make a name usable as a track path segment.
///
/// Whitespace becomes `_`; `[ ] . : /` are dropped.
pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | '.' | ':' | '/'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Transform components of a model.
pub(crate) fn transform_data(node: &Node) -> TransformData {
    TransformData {
        inherit_type: node
            .attribute("InheritType")
            .and_then(Attribute::as_i64)
            .map(InheritType::from_code)
            .unwrap_or_default(),
        euler_order: euler_order_from_code(
            node.attribute("RotationOrder")
                .and_then(Attribute::as_i64)
                .unwrap_or(0),
        ),
        translation: attr_vec3(node, "Lcl Translation"),
        pre_rotation: attr_vec3(node, "PreRotation"),
        rotation: attr_vec3(node, "Lcl Rotation"),
        post_rotation: attr_vec3(node, "PostRotation"),
        scale: attr_vec3(node, "Lcl Scaling"),
        scaling_offset: attr_vec3(node, "ScalingOffset"),
        scaling_pivot: attr_vec3(node, "ScalingPivot"),
        rotation_offset: attr_vec3(node, "RotationOffset"),
        rotation_pivot: attr_vec3(node, "RotationPivot"),
        ..Default::default()
    }
}

/// Build a node for every model, wire the hierarchy, compose transforms and
/// bind skins. Returns model id -> node index.
///
/// The scene is left with its top-level nodes in `roots`; `finish_root`
/// wraps them once animation has been read.
pub(crate) fn build_scene(
    ctx: &DecodeContext<'_>,
    deformers: &Deformers,
    geometries: &IndexMap<i64, usize>,
    materials: &IndexMap<i64, usize>,
    scene: &mut UnifiedScene,
) -> IndexMap<i64, usize> {
    let mut models: IndexMap<i64, usize> = IndexMap::new();
    let mut bones: HashMap<i64, Vec<Option<usize>>> = deformers
        .skeletons
        .values()
        .map(|s| (s.id, vec![None; s.bones.len()]))
        .collect();
    let mut shared_default = None;

    for node in ctx.tree.objects_of("Model") {
        let Some(id) = node.numeric_id() else {
            continue;
        };

        let slots = deformers.bone_slots(ctx.parents(id));
        let mut scene_node = if slots.is_empty() {
            model_node(ctx, node, id, geometries, materials, scene, &mut shared_default)
        } else {
            SceneNode::new("").with_kind(NodeKind::Bone)
        };

        let original_name = node.attr_name.clone().unwrap_or_default();
        scene_node.name = sanitize_name(&original_name);
        scene_node.original_name = original_name;
        scene_node.fbx_id = Some(id);
        scene_node.metadata.model_type = node.attr_type.clone();
        scene_node.metadata.custom = user_properties(node);
        scene_node.transform_data = Some(transform_data(node));
        scene_node.look_at = look_at_target(ctx, node, id);

        let index = scene.add_node(scene_node);
        for (skeleton, slot) in slots {
            if let Some(entry) = bones.get_mut(&skeleton).and_then(|b| b.get_mut(slot)) {
                *entry = Some(index);
            }
        }
        models.insert(id, index);
    }

    for (&id, &index) in &models {
        let parent = ctx
            .parents(id)
            .iter()
            .filter_map(|p| models.get(&p.id))
            .last();
        match parent {
            Some(&parent) if parent != index => scene.attach(parent, index),
            _ => scene.roots.push(index),
        }
    }

    add_ambient_light(ctx, scene);
    compute_transforms(scene);
    bind_skeletons(ctx, deformers, &bones, &models, scene);
    flag_morph_materials(scene);

    debug!("Built {} model nodes", models.len());
    models
}

/// Wrap the top-level nodes under one root and return its index.
///
/// With `collapse` set, a lone top-level group becomes the root itself.
pub(crate) fn finish_root(scene: &mut UnifiedScene, collapse: bool) -> usize {
    if let [only] = *scene.roots.as_slice() {
        if collapse && scene.nodes[only].kind == NodeKind::Group {
            return only;
        }
    }
    let top_level = scene.roots.clone();
    let root = scene.add_root(SceneNode::new(""));
    for child in top_level {
        scene.attach(root, child);
    }
    root
}

fn model_node(
    ctx: &DecodeContext<'_>,
    node: &Node,
    id: i64,
    geometries: &IndexMap<i64, usize>,
    materials: &IndexMap<i64, usize>,
    scene: &mut UnifiedScene,
    shared_default: &mut Option<usize>,
) -> SceneNode {
    match node.attr_type.as_deref() {
        Some("Camera") => SceneNode::new("").with_kind(camera(ctx, id)),
        Some("Light") => SceneNode::new("").with_kind(light(ctx, id)),
        Some("Mesh") => mesh_node(ctx, id, geometries, materials, scene, shared_default),
        Some("NurbsCurve") => {
            let mut line = SceneNode::new("").with_kind(NodeKind::Line);
            line.geometry = ctx
                .children(id)
                .iter()
                .filter_map(|c| geometries.get(&c.id))
                .last()
                .copied();
            line
        }
        Some("LimbNode") | Some("Root") => SceneNode::new("").with_kind(NodeKind::Bone),
        _ => SceneNode::new(""),
    }
}

fn mesh_node(
    ctx: &DecodeContext<'_>,
    id: i64,
    geometries: &IndexMap<i64, usize>,
    materials: &IndexMap<i64, usize>,
    scene: &mut UnifiedScene,
    shared_default: &mut Option<usize>,
) -> SceneNode {
    let children = ctx.children(id);
    let geometry = children
        .iter()
        .filter_map(|c| geometries.get(&c.id))
        .last()
        .copied();
    let mut material_indices: Vec<usize> = children
        .iter()
        .filter_map(|c| materials.get(&c.id))
        .copied()
        .collect();
    if material_indices.is_empty() {
        material_indices.push(*shared_default.get_or_insert_with(|| scene.add_material(default_material())));
    }

    if let Some(g) = geometry {
        let has_colors = scene.geometries[g]
            .as_mesh()
            .is_some_and(|m| m.colors.is_some());
        if has_colors {
            for &m in &material_indices {
                scene.materials[m].vertex_colors = true;
            }
        }

        let mut needs_default = false;
        if let Some(mesh) = scene.geometries[g].as_mesh_mut() {
            let count = material_indices.len();
            for group in &mut mesh.groups {
                if group.material_index >= count {
                    group.material_index = count;
                    needs_default = true;
                }
            }
            if mesh.skin_weights.is_some() {
                mesh.normalize_skin_weights();
            }
        }
        if needs_default {
            material_indices
                .push(*shared_default.get_or_insert_with(|| scene.add_material(default_material())));
        }
    }

    let mut mesh = SceneNode::new("").with_kind(NodeKind::Mesh);
    mesh.geometry = geometry;
    mesh.materials = material_indices;
    mesh
}

/// The last `NodeAttribute` connected to a model.
fn node_attribute<'a>(ctx: &DecodeContext<'a>, id: i64) -> Option<&'a Node> {
    ctx.children(id)
        .iter()
        .filter_map(|c| ctx.object("NodeAttribute", c.id))
        .last()
}

fn camera(ctx: &DecodeContext<'_>, id: i64) -> NodeKind {
    let Some(attribute) = node_attribute(ctx, id) else {
        return NodeKind::Object;
    };
    let value = |name: &str| attribute.attr_f64(name).map(|v| v as f32);

    let near = value("NearPlane").map_or(1.0, |v| v / 1000.0);
    let far = value("FarPlane").map_or(1000.0, |v| v / 1000.0);

    let [default_width, default_height] = ctx.options.viewport;
    let (width, height) = match (value("AspectWidth"), value("AspectHeight")) {
        (Some(w), Some(h)) => (w, h),
        _ => (default_width, default_height),
    };
    let aspect = if height != 0.0 { width / height } else { 1.0 };
    let focal_length = value("FocalLength");

    let projection = match attribute
        .attribute("CameraProjectionType")
        .and_then(Attribute::as_i64)
        .unwrap_or(0)
    {
        0 => {
            let fov = match focal_length {
                Some(f) if f > 0.0 => {
                    let film_height = FILM_GAUGE / aspect.max(1.0);
                    (2.0 * (0.5 * film_height / f).atan()).to_degrees()
                }
                _ => value("FieldOfView").unwrap_or(45.0),
            };
            Projection::Perspective { fov, aspect }
        }
        1 => Projection::Orthographic {
            left: -width / 2.0,
            right: width / 2.0,
            top: height / 2.0,
            bottom: -height / 2.0,
        },
        other => {
            warn!("Unknown camera type {}", other);
            return NodeKind::Object;
        }
    };

    NodeKind::Camera(Camera {
        projection,
        near,
        far,
        focal_length,
    })
}

fn light(ctx: &DecodeContext<'_>, id: i64) -> NodeKind {
    let Some(attribute) = node_attribute(ctx, id) else {
        return NodeKind::Object;
    };
    let value = |name: &str| attribute.attr_f64(name);

    let color = attr_vec3(attribute, "Color").map_or(Vec3::ONE, srgb_vec3_to_linear);
    let mut intensity = value("Intensity").map_or(1.0, |v| v as f32 / 100.0);
    if value("CastLightOnObject") == Some(0.0) {
        intensity = 0.0;
    }

    let distance = match value("FarAttenuationEnd") {
        Some(_) if value("EnableFarAttenuation") == Some(0.0) => 0.0,
        Some(end) => end as f32,
        None => 0.0,
    };

    let light_type = match value("LightType").map_or(0, |v| v as i64) {
        0 => LightType::Point,
        1 => LightType::Directional,
        2 => {
            let angle = value("InnerAngle").map_or(FRAC_PI_3, |v| (v as f32).to_radians());
            let penumbra = value("OuterAngle").map_or(0.0, |v| (v as f32).to_radians().max(1.0));
            LightType::Spot { angle, penumbra }
        }
        other => {
            warn!("Unknown light type {}, defaulting to a point light", other);
            LightType::Point
        }
    };

    NodeKind::Light(Light {
        light_type,
        color,
        intensity,
        distance,
        decay: 1.0,
        cast_shadow: value("CastShadows") == Some(1.0),
    })
}

fn metadata_value(attribute: &Attribute) -> MetadataValue {
    match &attribute.value {
        AttributeValue::Number(v) => match attribute.type_name.as_str() {
            "bool" | "Bool" => MetadataValue::Bool(*v != 0.0),
            "int" | "Integer" | "enum" | "KTime" => MetadataValue::Int(*v as i64),
            _ => MetadataValue::Float(*v),
        },
        AttributeValue::Vector(v) => {
            MetadataValue::Array(v.iter().map(|c| MetadataValue::Float(*c)).collect())
        }
        AttributeValue::Text(s) => MetadataValue::String(s.clone()),
        AttributeValue::Empty => MetadataValue::String(String::new()),
    }
}

/// User-defined (`U` flagged) properties of a model.
fn user_properties(node: &Node) -> IndexMap<String, MetadataValue> {
    node.attributes
        .values()
        .filter(|a| a.flag.contains('U'))
        .map(|a| (a.name.clone(), metadata_value(a)))
        .collect()
}

/// Position of the model this one is aimed at, if any.
fn look_at_target(ctx: &DecodeContext<'_>, node: &Node, id: i64) -> Option<Vec3> {
    node.attribute("LookAtProperty")?;
    ctx.children(id)
        .iter()
        .filter(|c| c.relationship.as_deref() == Some("LookAtProperty"))
        .filter_map(|c| ctx.model(c.id))
        .find_map(|target| attr_vec3(target, "Lcl Translation"))
}

fn add_ambient_light(ctx: &DecodeContext<'_>, scene: &mut UnifiedScene) {
    let Some(color) = ctx
        .tree
        .get("GlobalSettings")
        .and_then(|settings| attr_vec3(settings, "AmbientColor"))
    else {
        return;
    };
    if color == Vec3::ZERO {
        return;
    }
    let ambient = SceneNode::new("AmbientLight").with_kind(NodeKind::Light(Light {
        light_type: LightType::Ambient,
        color: srgb_vec3_to_linear(color),
        intensity: 1.0,
        distance: 0.0,
        decay: 1.0,
        cast_shadow: false,
    }));
    scene.add_root(ambient);
}

/// Compose local and world matrices top-down.
fn compute_transforms(scene: &mut UnifiedScene) {
    let mut stack: Vec<(usize, Option<(Mat4, Mat4)>)> =
        scene.roots.iter().rev().map(|&r| (r, None)).collect();

    while let Some((index, parent)) = stack.pop() {
        let node = &mut scene.nodes[index];
        let local = match node.transform_data.as_mut() {
            Some(data) => {
                if let Some((parent_local, parent_world)) = parent {
                    data.parent_matrix = Some(parent_local);
                    data.parent_matrix_world = Some(parent_world);
                }
                generate_transform(data)
            }
            None => node.transform,
        };
        let world = parent.map_or(local, |(_, parent_world)| parent_world * local);
        node.transform = local;
        node.world_transform = world;

        for &child in node.children.iter().rev() {
            stack.push((child, Some((local, world))));
        }
    }
}

fn bind_skeletons(
    ctx: &DecodeContext<'_>,
    deformers: &Deformers,
    bones: &HashMap<i64, Vec<Option<usize>>>,
    models: &IndexMap<i64, usize>,
    scene: &mut UnifiedScene,
) {
    let poses = parse_bind_poses(ctx);

    for skeleton in deformers.skeletons.values() {
        let bone_nodes = bones
            .get(&skeleton.id)
            .cloned()
            .unwrap_or_else(|| vec![None; skeleton.bones.len()]);
        let inverse_bind_matrices: Vec<Mat4> = skeleton
            .bones
            .iter()
            .map(|b| b.transform_link.inverse())
            .collect();

        for geometry in ctx.parents(skeleton.id) {
            if ctx.object("Geometry", geometry.id).is_none() {
                continue;
            }
            for owner in ctx.parents(geometry.id) {
                let Some(&index) = models.get(&owner.id) else {
                    continue;
                };
                if !scene.nodes[index].is_mesh() {
                    continue;
                }
                let bind_matrix = poses
                    .get(&owner.id)
                    .copied()
                    .unwrap_or(scene.nodes[index].world_transform);
                scene.skins.push(Skin {
                    bones: bone_nodes.clone(),
                    inverse_bind_matrices: inverse_bind_matrices.clone(),
                    bind_matrix,
                });
                scene.nodes[index].skin = Some(scene.skins.len() - 1);
            }
        }
    }
}

fn has_morph_targets(geometries: &[Geometry], node: &SceneNode) -> bool {
    node.is_mesh()
        && node
            .geometry
            .and_then(|g| geometries.get(g))
            .and_then(Geometry::as_mesh)
            .is_some_and(TriangleMesh::has_morph_targets)
}

/// Mark materials of morphing meshes, copying any that static meshes share.
fn flag_morph_materials(scene: &mut UnifiedScene) {
    let static_materials: HashSet<usize> = scene
        .nodes
        .iter()
        .filter(|n| n.is_mesh() && !has_morph_targets(&scene.geometries, n))
        .flat_map(|n| n.materials.iter().copied())
        .collect();
    let mut copies: HashMap<usize, usize> = HashMap::new();

    for index in 0..scene.nodes.len() {
        if !has_morph_targets(&scene.geometries, &scene.nodes[index]) {
            continue;
        }
        let mut materials = std::mem::take(&mut scene.nodes[index].materials);
        for slot in &mut materials {
            let original = *slot;
            if static_materials.contains(&original) {
                let copy = *copies.entry(original).or_insert_with(|| {
                    let mut material = scene.materials[original].clone();
                    material.morph_targets = true;
                    scene.add_material(material)
                });
                *slot = copy;
            } else {
                scene.materials[original].morph_targets = true;
            }
        }
        scene.nodes[index].materials = materials;
    }
}
