//! `Geometry` objects: polygon meshes and their layer elements.
//!
//! Polygon meshes store a flat position array and a polygon vertex index
//! array in which a bit-complemented index (`!i`, stored negative) closes a
//! face. Every layer element (normals, UVs, colors, material indices) maps
//! onto the faces through a mapping type and a reference type:
//!
//! ```text
//! raw   = polygon vertex | polygon | vertex | indices[0]  (mapping type)
//! index = indices[raw] for IndexToDirect, else raw         (reference type)
//! value = buffer[index * size .. index * size + size]
//! ```

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use indexmap::IndexMap;
use kaydara_core::Node;
use log::{debug, warn};
use smallvec::SmallVec;

use super::context::{attr_vec3, srgb_to_linear, DecodeContext};
use super::deformers::{Deformers, MorphGroup, RawSkeleton};
use super::nurbs::parse_nurbs_curve;
use super::transform::{euler_order_from_code, generate_transform};
use crate::scene::{
    DrawGroup, Geometry, InheritType, MorphTarget, TransformData, TriangleMesh, UnifiedScene,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MappingType {
    ByPolygonVertex,
    ByPolygon,
    ByVertex,
    AllSame,
}

impl MappingType {
    fn parse(ctx: &DecodeContext<'_>, name: &str) -> Self {
        match name {
            "ByPolygonVertex" => MappingType::ByPolygonVertex,
            "ByPolygon" => MappingType::ByPolygon,
            "ByVertice" | "ByVertex" => MappingType::ByVertex,
            "AllSame" => MappingType::AllSame,
            other => {
                ctx.warn_once(
                    "mapping-type",
                    format!("Unknown attribute mapping type {}, reading it per polygon vertex", other),
                );
                MappingType::ByPolygonVertex
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceType {
    Direct,
    IndexToDirect,
}

impl ReferenceType {
    fn parse(name: &str) -> Self {
        match name {
            "IndexToDirect" | "Index" => ReferenceType::IndexToDirect,
            _ => ReferenceType::Direct,
        }
    }
}

/// One layer element of a mesh.
#[derive(Debug, Clone)]
struct LayerElement {
    data_size: usize,
    buffer: Vec<f64>,
    indices: Vec<i64>,
    mapping: MappingType,
    reference: ReferenceType,
}

impl LayerElement {
    fn parse(
        ctx: &DecodeContext<'_>,
        node: &Node,
        data_size: usize,
        buffer_name: &str,
        index_names: &[&str],
    ) -> Option<Self> {
        let buffer = node.array_f64(buffer_name)?;
        let mapping = MappingType::parse(
            ctx,
            node.value_str("MappingInformationType").unwrap_or("ByPolygonVertex"),
        );
        let reference =
            ReferenceType::parse(node.value_str("ReferenceInformationType").unwrap_or("Direct"));
        let indices = match reference {
            ReferenceType::IndexToDirect => index_names
                .iter()
                .find_map(|name| node.array_i64(name))
                .unwrap_or_default(),
            ReferenceType::Direct => Vec::new(),
        };
        Some(Self {
            data_size,
            buffer,
            indices,
            mapping,
            reference,
        })
    }

    /// Material layers index a material per polygon; `NoMappingInformation`
    /// means one material for everything.
    fn parse_materials(ctx: &DecodeContext<'_>, node: &Node) -> Self {
        let mapping_name = node.value_str("MappingInformationType").unwrap_or("AllSame");
        let reference =
            ReferenceType::parse(node.value_str("ReferenceInformationType").unwrap_or("Direct"));
        if mapping_name == "NoMappingInformation" {
            return Self {
                data_size: 1,
                buffer: vec![0.0],
                indices: vec![0],
                mapping: MappingType::AllSame,
                reference,
            };
        }
        let buffer = node.array_f64("Materials").unwrap_or_default();
        let indices = (0..buffer.len() as i64).collect();
        Self {
            data_size: 1,
            buffer,
            indices,
            mapping: MappingType::parse(ctx, mapping_name),
            reference,
        }
    }

    /// Values for one polygon vertex; lookups out of range read zeros.
    fn get(&self, polygon_vertex: usize, polygon: usize, vertex: usize) -> [f64; 4] {
        let mut out = [0.0; 4];
        let index = match self.mapping {
            MappingType::ByPolygonVertex => polygon_vertex as i64,
            MappingType::ByPolygon => polygon as i64,
            MappingType::ByVertex => vertex as i64,
            MappingType::AllSame => self.indices.first().copied().unwrap_or(0),
        };
        let index = match (self.reference, self.mapping) {
            (ReferenceType::IndexToDirect, mapping) if mapping != MappingType::AllSame => {
                match usize::try_from(index).ok().and_then(|i| self.indices.get(i)) {
                    Some(&i) => i,
                    None => return out,
                }
            }
            _ => index,
        };
        let Ok(index) = usize::try_from(index) else {
            return out;
        };
        let Some(from) = index.checked_mul(self.data_size) else {
            return out;
        };
        for (k, slot) in out.iter_mut().take(self.data_size).enumerate() {
            if let Some(v) = from.checked_add(k).and_then(|i| self.buffer.get(i)) {
                *slot = *v;
            }
        }
        out
    }
}

/// A bone's pull on one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Influence {
    bone: u32,
    weight: f32,
}

/// Everything needed to triangulate one mesh.
#[derive(Debug, Default)]
struct GeoInfo {
    positions: Vec<f64>,
    polygon_vertex_index: Vec<i64>,
    normal: Option<LayerElement>,
    color: Option<LayerElement>,
    uvs: Vec<LayerElement>,
    material: Option<LayerElement>,
    skinned: bool,
    weight_table: HashMap<usize, SmallVec<[Influence; 4]>>,
}

/// Layer 0 of an element, or the first one present.
fn first_layer<'a>(geometry: &'a Node, name: &str) -> Option<&'a Node> {
    geometry
        .child_by_id(name, 0)
        .or_else(|| geometry.child(name))
}

impl GeoInfo {
    fn parse(ctx: &DecodeContext<'_>, node: &Node, skeleton: Option<&RawSkeleton>) -> Self {
        let mut info = GeoInfo {
            positions: node.array_f64("Vertices").unwrap_or_default(),
            polygon_vertex_index: node.array_i64("PolygonVertexIndex").unwrap_or_default(),
            ..Default::default()
        };

        info.color = first_layer(node, "LayerElementColor")
            .and_then(|layer| LayerElement::parse(ctx, layer, 4, "Colors", &["ColorIndex"]));
        info.material = first_layer(node, "LayerElementMaterial")
            .map(|layer| LayerElement::parse_materials(ctx, layer));
        info.normal = first_layer(node, "LayerElementNormal").and_then(|layer| {
            LayerElement::parse(ctx, layer, 3, "Normals", &["NormalIndex", "NormalsIndex"])
        });
        info.uvs = node
            .children_named("LayerElementUV")
            .filter_map(|layer| LayerElement::parse(ctx, layer, 2, "UV", &["UVIndex"]))
            .collect();

        if let Some(skeleton) = skeleton {
            info.skinned = true;
            for (slot, bone) in skeleton.bones.iter().enumerate() {
                for (j, &index) in bone.indices.iter().enumerate() {
                    let Ok(index) = usize::try_from(index) else {
                        continue;
                    };
                    let weight = bone.weights.get(j).copied().unwrap_or(0.0);
                    info.weight_table.entry(index).or_default().push(Influence {
                        bone: slot as u32,
                        weight: weight as f32,
                    });
                }
            }
        }

        info
    }

    fn position(&self, vertex: usize) -> Vec3 {
        let p = |k: usize| {
            vertex
                .checked_mul(3)
                .and_then(|i| i.checked_add(k))
                .and_then(|i| self.positions.get(i))
                .copied()
                .unwrap_or(0.0) as f32
        };
        Vec3::new(p(0), p(1), p(2))
    }
}

/// Keep the four strongest influences, in descending order when trimming.
fn top_four(ctx: &DecodeContext<'_>, influences: &[Influence]) -> ([u32; 4], [f32; 4]) {
    let mut indices = [0u32; 4];
    let mut weights = [0f32; 4];

    if influences.len() > 4 {
        ctx.warn_once(
            "skin-weights",
            "Vertex has more than 4 skinning weights assigned, deleting additional weights",
        );
        for influence in influences {
            let mut weight = influence.weight;
            let mut bone = influence.bone;
            for slot in 0..4 {
                if weight > weights[slot] {
                    std::mem::swap(&mut weights[slot], &mut weight);
                    std::mem::swap(&mut indices[slot], &mut bone);
                }
            }
        }
    } else {
        for (slot, influence) in influences.iter().enumerate() {
            indices[slot] = influence.bone;
            weights[slot] = influence.weight;
        }
    }

    (indices, weights)
}

/// Attributes of one face corner.
#[derive(Debug, Clone, Default)]
struct Corner {
    position: Vec3,
    normal: Vec3,
    color: Vec4,
    uvs: SmallVec<[Vec2; 2]>,
    skin_indices: [u32; 4],
    skin_weights: [f32; 4],
    material: usize,
}

/// Per-vertex output of the triangulation; every buffer has one entry per
/// emitted vertex, for the attributes the mesh carries.
#[derive(Debug, Default)]
struct Buffers {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec4>,
    uvs: Vec<Vec<Vec2>>,
    skin_indices: Vec<[u32; 4]>,
    skin_weights: Vec<[f32; 4]>,
    material_indices: Vec<usize>,
}

fn has_material_groups(info: &GeoInfo) -> bool {
    info.material
        .as_ref()
        .is_some_and(|m| m.mapping != MappingType::AllSame)
}

fn gen_buffers(ctx: &DecodeContext<'_>, info: &GeoInfo) -> Buffers {
    let mut buffers = Buffers {
        uvs: vec![Vec::new(); info.uvs.len()],
        ..Default::default()
    };
    let grouped = has_material_groups(info);

    let mut face: Vec<Corner> = Vec::new();
    let mut polygon = 0usize;
    let mut negative_material = false;

    for (polygon_vertex, &raw) in info.polygon_vertex_index.iter().enumerate() {
        let end_of_face = raw < 0;
        let vertex = (if end_of_face { !raw } else { raw }) as usize;

        let mut corner = Corner {
            position: info.position(vertex),
            ..Default::default()
        };

        if let Some(color) = &info.color {
            let c = color.get(polygon_vertex, polygon, vertex);
            corner.color = Vec4::new(
                srgb_to_linear(c[0] as f32),
                srgb_to_linear(c[1] as f32),
                srgb_to_linear(c[2] as f32),
                c[3] as f32,
            );
        }

        if info.skinned {
            let influences = info
                .weight_table
                .get(&vertex)
                .map_or(&[][..], |list| list.as_slice());
            (corner.skin_indices, corner.skin_weights) = top_four(ctx, influences);
        }

        if let Some(normal) = &info.normal {
            let n = normal.get(polygon_vertex, polygon, vertex);
            corner.normal = Vec3::new(n[0] as f32, n[1] as f32, n[2] as f32);
        }

        if let (true, Some(material)) = (grouped, &info.material) {
            let index = material.get(polygon_vertex, polygon, vertex)[0] as i64;
            corner.material = usize::try_from(index).unwrap_or_else(|_| {
                negative_material = true;
                0
            });
        }

        for uv in &info.uvs {
            let t = uv.get(polygon_vertex, polygon, vertex);
            corner.uvs.push(Vec2::new(t[0] as f32, t[1] as f32));
        }

        face.push(corner);

        if end_of_face {
            emit_face(&mut buffers, info, &face);
            polygon += 1;
            face.clear();
        }
    }

    if negative_material {
        warn!("The file contains negative material indices, the asset might not render as expected");
    }

    buffers
}

/// Fan-triangulate one face around its first corner.
fn emit_face(buffers: &mut Buffers, info: &GeoInfo, face: &[Corner]) {
    // The face's last corner decides its material.
    let material = face.last().map_or(0, |c| c.material);
    let grouped = has_material_groups(info);

    for i in 2..face.len() {
        for corner in [&face[0], &face[i - 1], &face[i]] {
            buffers.positions.push(corner.position);
            if info.normal.is_some() {
                buffers.normals.push(corner.normal);
            }
            if info.color.is_some() {
                buffers.colors.push(corner.color);
            }
            if info.skinned {
                buffers.skin_indices.push(corner.skin_indices);
                buffers.skin_weights.push(corner.skin_weights);
            }
            if grouped {
                buffers.material_indices.push(material);
            }
            for (set, uv) in buffers.uvs.iter_mut().zip(&corner.uvs) {
                set.push(*uv);
            }
        }
    }
}

/// Collapse per-vertex material indices into contiguous draw groups.
fn material_groups(indices: &[usize]) -> Vec<DrawGroup> {
    let mut groups = Vec::new();
    let Some(&first) = indices.first() else {
        return groups;
    };

    let mut previous = first;
    let mut start = 0;
    for (i, &current) in indices.iter().enumerate() {
        if current != previous {
            groups.push(DrawGroup {
                start,
                count: i - start,
                material_index: previous,
            });
            previous = current;
            start = i;
        }
    }

    let covered = groups.last().map_or(0, |g| g.start + g.count);
    if covered != indices.len() {
        groups.push(DrawGroup {
            start: covered,
            count: indices.len() - covered,
            material_index: previous,
        });
    }
    groups
}

/// Build every mesh and curve geometry; returns geometry id -> index.
pub(crate) fn parse_geometries(
    ctx: &DecodeContext<'_>,
    deformers: &Deformers,
    scene: &mut UnifiedScene,
) -> IndexMap<i64, usize> {
    let mut geometries = IndexMap::new();
    for node in ctx.tree.objects_of("Geometry") {
        let Some(id) = node.numeric_id() else {
            continue;
        };
        let geometry = match node.attr_type.as_deref() {
            Some("Mesh") => parse_mesh_geometry(ctx, node, id, deformers).map(Geometry::Mesh),
            Some("NurbsCurve") => Some(Geometry::Lines(parse_nurbs_curve(ctx, node))),
            _ => None,
        };
        if let Some(geometry) = geometry {
            geometries.insert(id, scene.add_geometry(geometry));
        }
    }
    debug!("Parsed {} geometries", geometries.len());
    geometries
}

/// Geometric (pivot) transform of the model that owns a geometry.
fn geometric_transform(model: &Node) -> Mat4 {
    let data = TransformData {
        euler_order: model
            .attribute("RotationOrder")
            .and_then(|a| a.as_i64())
            .map(euler_order_from_code)
            .unwrap_or_default(),
        inherit_type: model
            .attribute("InheritType")
            .and_then(|a| a.as_i64())
            .map(InheritType::from_code)
            .unwrap_or_default(),
        translation: attr_vec3(model, "GeometricTranslation"),
        rotation: attr_vec3(model, "GeometricRotation"),
        scale: attr_vec3(model, "GeometricScaling"),
        ..Default::default()
    };
    generate_transform(&data)
}

fn parse_mesh_geometry(
    ctx: &DecodeContext<'_>,
    node: &Node,
    id: i64,
    deformers: &Deformers,
) -> Option<TriangleMesh> {
    let models: Vec<&Node> = ctx.parents(id).iter().filter_map(|p| ctx.model(p.id)).collect();
    let Some(model) = models.first() else {
        debug!("Skipping geometry {} that no model uses", id);
        return None;
    };

    let children = ctx.children(id);
    let skeleton = children
        .iter()
        .filter_map(|c| deformers.skeletons.get(&c.id))
        .last();
    let morph_groups: Vec<&MorphGroup> = children
        .iter()
        .filter_map(|c| deformers.morph_groups.get(&c.id))
        .collect();

    let pre_transform = geometric_transform(model);
    Some(build_mesh(ctx, node, skeleton, &morph_groups, pre_transform))
}

fn build_mesh(
    ctx: &DecodeContext<'_>,
    node: &Node,
    skeleton: Option<&RawSkeleton>,
    morph_groups: &[&MorphGroup],
    pre_transform: Mat4,
) -> TriangleMesh {
    let info = GeoInfo::parse(ctx, node, skeleton);
    let buffers = gen_buffers(ctx, &info);

    let mut mesh = TriangleMesh {
        name: node.attr_name.clone().unwrap_or_default(),
        positions: buffers
            .positions
            .iter()
            .map(|p| pre_transform.transform_point3(*p))
            .collect(),
        ..Default::default()
    };

    if info.normal.is_some() {
        let normal_matrix = Mat3::from_mat4(pre_transform).inverse().transpose();
        mesh.normals = Some(
            buffers
                .normals
                .iter()
                .map(|n| (normal_matrix * *n).normalize_or_zero())
                .collect(),
        );
    }
    if info.color.is_some() {
        mesh.colors = Some(buffers.colors);
    }
    mesh.uv_sets = buffers.uvs;
    if info.skinned {
        mesh.skin_indices = Some(buffers.skin_indices);
        mesh.skin_weights = Some(buffers.skin_weights);
    }
    if has_material_groups(&info) {
        mesh.groups = material_groups(&buffers.material_indices);
    }

    mesh.morph_targets = morph_targets(ctx, node, morph_groups, pre_transform);
    mesh.indices = (0..mesh.positions.len() as u32).collect();

    if ctx.options.compute_normals && mesh.normals.is_none() {
        mesh.compute_normals();
    }
    mesh
}

/// Absolute positions of every blend shape of a mesh.
///
/// Shape geometries store sparse offsets from the base mesh; they are
/// applied to a copy of the base positions and triangulated like the base.
fn morph_targets(
    ctx: &DecodeContext<'_>,
    parent: &Node,
    groups: &[&MorphGroup],
    pre_transform: Mat4,
) -> Vec<MorphTarget> {
    let mut targets = Vec::new();
    for target in groups.iter().flat_map(|g| &g.targets) {
        let Some(shape) = target.geometry_id.and_then(|id| ctx.object("Geometry", id)) else {
            continue;
        };

        let mut positions = parent.array_f64("Vertices").unwrap_or_default();
        let deltas = shape.array_f64("Vertices").unwrap_or_default();
        let indexes = shape.array_i64("Indexes").unwrap_or_default();
        for (i, &index) in indexes.iter().enumerate() {
            let Ok(index) = usize::try_from(index) else {
                continue;
            };
            let Some(base) = index.checked_mul(3) else {
                continue;
            };
            for k in 0..3 {
                if let (Some(p), Some(d)) = (positions.get_mut(base + k), deltas.get(i * 3 + k)) {
                    *p += d;
                }
            }
        }

        let info = GeoInfo {
            positions,
            polygon_vertex_index: parent.array_i64("PolygonVertexIndex").unwrap_or_default(),
            ..Default::default()
        };
        let buffers = gen_buffers(ctx, &info);

        let name = if target.name.is_empty() {
            shape.attr_name.clone().unwrap_or_default()
        } else {
            target.name.clone()
        };
        targets.push(MorphTarget {
            name,
            positions: buffers
                .positions
                .iter()
                .map(|p| pre_transform.transform_point3(*p))
                .collect(),
        });
    }
    targets
}
