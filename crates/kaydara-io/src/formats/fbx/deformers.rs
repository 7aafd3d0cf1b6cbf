//! `Deformer` objects (skins and blend shapes) and bind poses.

use glam::Mat4;
use indexmap::IndexMap;
use kaydara_core::Link;
use log::{debug, warn};

use super::context::{mat4_from_slice, DecodeContext};

/// One `Cluster` of a skin: a bone and the vertices it moves.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawBone {
    /// Cluster id; the bone model is a child of it.
    pub id: i64,
    pub indices: Vec<i64>,
    pub weights: Vec<f64>,
    /// Bone world matrix at bind time.
    pub transform_link: Mat4,
}

/// A `Skin` deformer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawSkeleton {
    pub id: i64,
    pub geometry_id: Option<i64>,
    pub bones: Vec<RawBone>,
}

/// One `BlendShapeChannel`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawMorphTarget {
    pub name: String,
    pub initial_weight: f64,
    pub id: i64,
    pub full_weights: Vec<f64>,
    /// `Shape` geometry holding the sparse offsets.
    pub geometry_id: Option<i64>,
}

/// A `BlendShape` deformer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MorphGroup {
    pub id: i64,
    pub targets: Vec<RawMorphTarget>,
}

#[derive(Debug, Default)]
pub(crate) struct Deformers {
    pub skeletons: IndexMap<i64, RawSkeleton>,
    pub morph_groups: IndexMap<i64, MorphGroup>,
}

impl Deformers {
    /// Skeleton slot and skeleton id of every cluster that drives `model_id`.
    pub fn bone_slots(&self, parents: &[Link]) -> Vec<(i64, usize)> {
        let mut slots = Vec::new();
        for parent in parents {
            for skeleton in self.skeletons.values() {
                for (slot, bone) in skeleton.bones.iter().enumerate() {
                    if bone.id == parent.id {
                        slots.push((skeleton.id, slot));
                    }
                }
            }
        }
        slots
    }
}

pub(crate) fn parse_deformers(ctx: &DecodeContext<'_>) -> Deformers {
    let mut deformers = Deformers::default();

    for node in ctx.tree.objects_of("Deformer") {
        let Some(id) = node.numeric_id() else {
            continue;
        };
        let parents = ctx.parents(id);

        match node.attr_type.as_deref() {
            Some("Skin") => {
                if parents.len() > 1 {
                    warn!("Skeleton {} is attached to more than one geometry, using the first", id);
                }
                let skeleton = RawSkeleton {
                    id,
                    geometry_id: parents.first().map(|p| p.id),
                    bones: parse_clusters(ctx, id),
                };
                deformers.skeletons.insert(id, skeleton);
            }
            Some("BlendShape") => {
                if parents.len() > 1 {
                    warn!("Morph target {} is attached to more than one geometry, using the first", id);
                }
                let group = MorphGroup {
                    id,
                    targets: parse_channels(ctx, id),
                };
                deformers.morph_groups.insert(id, group);
            }
            _ => {}
        }
    }

    debug!(
        "Parsed {} skeletons and {} morph groups",
        deformers.skeletons.len(),
        deformers.morph_groups.len()
    );
    deformers
}

fn parse_clusters(ctx: &DecodeContext<'_>, skin_id: i64) -> Vec<RawBone> {
    ctx.children(skin_id)
        .iter()
        .filter_map(|child| {
            let cluster = ctx.object("Deformer", child.id)?;
            if cluster.attr_type.as_deref() != Some("Cluster") {
                return None;
            }
            let transform_link = cluster
                .array_f64("TransformLink")
                .and_then(|m| mat4_from_slice(&m))
                .unwrap_or(Mat4::IDENTITY);
            let (indices, weights) = if cluster.has_child("Indexes") {
                (
                    cluster.array_i64("Indexes").unwrap_or_default(),
                    cluster.array_f64("Weights").unwrap_or_default(),
                )
            } else {
                (Vec::new(), Vec::new())
            };
            Some(RawBone {
                id: child.id,
                indices,
                weights,
                transform_link,
            })
        })
        .collect()
}

fn parse_channels(ctx: &DecodeContext<'_>, blend_shape_id: i64) -> Vec<RawMorphTarget> {
    ctx.children(blend_shape_id)
        .iter()
        .filter_map(|child| {
            let channel = ctx.object("Deformer", child.id)?;
            if channel.attr_type.as_deref() != Some("BlendShapeChannel") {
                return None;
            }
            let geometry_id = ctx
                .children(child.id)
                .iter()
                .find(|link| link.relationship.is_none())
                .map(|link| link.id);
            Some(RawMorphTarget {
                name: channel.attr_name.clone().unwrap_or_default(),
                initial_weight: channel
                    .value_f64("DeformPercent")
                    .or_else(|| channel.attr_f64("DeformPercent"))
                    .unwrap_or(0.0),
                id: child.id,
                full_weights: channel.array_f64("FullWeights").unwrap_or_default(),
                geometry_id,
            })
        })
        .collect()
}

/// World matrices from `BindPose` poses, keyed by model id.
pub(crate) fn parse_bind_poses(ctx: &DecodeContext<'_>) -> IndexMap<i64, Mat4> {
    let mut matrices = IndexMap::new();
    for pose in ctx.tree.objects_of("Pose") {
        if pose.attr_type.as_deref() != Some("BindPose") {
            continue;
        }
        for pose_node in pose.children_named("PoseNode") {
            let node_id = pose_node.value_i64("Node");
            let matrix = pose_node.array_f64("Matrix").and_then(|m| mat4_from_slice(&m));
            if let (Some(id), Some(matrix)) = (node_id, matrix) {
                matrices.insert(id, matrix);
            }
        }
    }
    matrices
}
