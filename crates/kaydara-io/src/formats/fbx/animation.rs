//! Animation stacks, layers and curves.
//!
//! ```text
//! AnimationStack -> AnimationLayer -> AnimationCurveNode (T, R, S, DeformPercent)
//!                                       -> AnimationCurve per axis ("d|X", "d|Y", "d|Z")
//! ```
//!
//! Each stack becomes one clip built from its first layer. Transform curve
//! nodes are grouped by the model they drive; missing axes hold the model's
//! resting value.

use glam::{Quat, Vec3};
use indexmap::IndexMap;
use log::{debug, warn};

use super::context::DecodeContext;
use crate::scene::{
    AnimationClip, Geometry, Track, TrackProperty, TrackValues, TransformData,
    UnifiedScene,
};

/// FBX time units per second.
const TICKS_PER_SECOND: f64 = 46_186_158_000.0;

/// Rotation keys further apart than this get intermediate keys.
const MAX_ROTATION_STEP: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Translation,
    Rotation,
    Scale,
    DeformPercent,
}

impl Channel {
    fn from_attr_name(name: &str) -> Option<Self> {
        match name {
            "T" => Some(Channel::Translation),
            "R" => Some(Channel::Rotation),
            "S" => Some(Channel::Scale),
            "DeformPercent" => Some(Channel::DeformPercent),
            _ => None,
        }
    }
}

/// One `AnimationCurve`, times in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
struct Curve {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl Curve {
    fn value_at(&self, time: f64) -> Option<f64> {
        let index = self.times.iter().position(|&t| t == time)?;
        self.values.get(index).copied()
    }
}

#[derive(Debug, Clone)]
struct CurveNode {
    channel: Channel,
    x: Option<Curve>,
    y: Option<Curve>,
    z: Option<Curve>,
    morph: Option<Curve>,
}

impl CurveNode {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            x: None,
            y: None,
            z: None,
            morph: None,
        }
    }

    fn axes(&self) -> [Option<&Curve>; 3] {
        [self.x.as_ref(), self.y.as_ref(), self.z.as_ref()]
    }

    fn has_axes(&self) -> bool {
        self.axes().iter().any(Option::is_some)
    }
}

/// Transform curve nodes driving one model.
#[derive(Debug, Default)]
struct ModelCurves<'c> {
    translation: Option<&'c CurveNode>,
    rotation: Option<&'c CurveNode>,
    scale: Option<&'c CurveNode>,
}

/// A blend shape weight curve resolved to its mesh.
#[derive(Debug)]
struct MorphCurve<'c> {
    node: usize,
    name: String,
    curve: &'c Curve,
}

#[derive(Debug, Default)]
struct Layer<'c> {
    models: IndexMap<usize, ModelCurves<'c>>,
    morphs: Vec<MorphCurve<'c>>,
}

/// Build one clip per animation stack.
pub(crate) fn parse_animations(
    ctx: &DecodeContext<'_>,
    models: &IndexMap<i64, usize>,
    scene: &UnifiedScene,
) -> Vec<AnimationClip> {
    if ctx.tree.objects_of("AnimationCurve").next().is_none() {
        return Vec::new();
    }

    let curve_nodes = parse_curve_nodes(ctx);
    let layers = parse_layers(ctx, &curve_nodes, models);

    let mut clips = Vec::new();
    for stack in ctx.tree.objects_of("AnimationStack") {
        let Some(id) = stack.numeric_id() else {
            continue;
        };
        let children = ctx.children(id);
        if children.len() > 1 {
            warn!(
                "Animation stack {} has more than one layer, only the first is used",
                id
            );
        }
        let Some(layer) = children.first().and_then(|c| layers.get(&c.id)) else {
            continue;
        };
        let name = stack.attr_name.clone().unwrap_or_default();
        clips.push(AnimationClip::new(name, layer_tracks(layer, scene)));
    }

    debug!("Parsed {} animation clips", clips.len());
    clips
}

fn parse_curve_nodes(ctx: &DecodeContext<'_>) -> IndexMap<i64, CurveNode> {
    let mut nodes = IndexMap::new();
    for node in ctx.tree.objects_of("AnimationCurveNode") {
        let Some(id) = node.numeric_id() else {
            continue;
        };
        let name = node.attr_name.as_deref().unwrap_or_default();
        match Channel::from_attr_name(name) {
            Some(channel) => {
                nodes.insert(id, CurveNode::new(channel));
            }
            None => ctx.warn_once(
                "curve-node-channel",
                format!("Skipping curve node {} with unsupported channel {:?}", id, name),
            ),
        }
    }

    for node in ctx.tree.objects_of("AnimationCurve") {
        let Some(id) = node.numeric_id() else {
            continue;
        };
        let Some(link) = ctx.parents(id).first() else {
            continue;
        };
        let Some(target) = nodes.get_mut(&link.id) else {
            continue;
        };

        let curve = Curve {
            times: node
                .array_i64("KeyTime")
                .unwrap_or_default()
                .into_iter()
                .map(|t| t as f64 / TICKS_PER_SECOND)
                .collect(),
            values: node.array_f64("KeyValueFloat").unwrap_or_default(),
        };

        let relationship = link.relationship.as_deref().unwrap_or_default();
        if relationship.contains('X') {
            target.x = Some(curve);
        } else if relationship.contains('Y') {
            target.y = Some(curve);
        } else if relationship.contains('Z') {
            target.z = Some(curve);
        } else if relationship.contains("DeformPercent") && target.channel == Channel::DeformPercent {
            target.morph = Some(curve);
        }
    }

    nodes
}

fn parse_layers<'c>(
    ctx: &DecodeContext<'_>,
    curve_nodes: &'c IndexMap<i64, CurveNode>,
    models: &IndexMap<i64, usize>,
) -> IndexMap<i64, Layer<'c>> {
    let mut layers = IndexMap::new();

    for layer_node in ctx.tree.objects_of("AnimationLayer") {
        let Some(layer_id) = layer_node.numeric_id() else {
            continue;
        };
        let mut layer = Layer::default();

        for child in ctx.children(layer_id) {
            let Some(curve_node) = curve_nodes.get(&child.id) else {
                continue;
            };

            if curve_node.channel == Channel::DeformPercent {
                if let Some(morph) = curve_node
                    .morph
                    .as_ref()
                    .and_then(|curve| morph_curve(ctx, child.id, models, curve))
                {
                    layer.morphs.push(morph);
                }
                continue;
            }
            if !curve_node.has_axes() {
                continue;
            }

            let model = ctx
                .parents(child.id)
                .iter()
                .find(|p| p.relationship.is_some())
                .and_then(|p| models.get(&p.id));
            let Some(&node) = model else {
                warn!("Encountered an unused curve node {}", child.id);
                continue;
            };

            let entry = layer.models.entry(node).or_default();
            match curve_node.channel {
                Channel::Translation => entry.translation = Some(curve_node),
                Channel::Rotation => entry.rotation = Some(curve_node),
                Channel::Scale => entry.scale = Some(curve_node),
                Channel::DeformPercent => {}
            }
        }

        layers.insert(layer_id, layer);
    }

    layers
}

/// Follow channel -> blend shape -> geometry -> model for a weight curve.
fn morph_curve<'c>(
    ctx: &DecodeContext<'_>,
    curve_node_id: i64,
    models: &IndexMap<i64, usize>,
    curve: &'c Curve,
) -> Option<MorphCurve<'c>> {
    let channel = ctx
        .parents(curve_node_id)
        .iter()
        .find(|p| p.relationship.is_some())?
        .id;
    let blend_shape = ctx.parents(channel).first()?.id;
    let geometry = ctx.parents(blend_shape).first()?.id;
    let model = ctx.parents(geometry).first()?.id;

    Some(MorphCurve {
        node: *models.get(&model)?,
        name: ctx.object("Deformer", channel)?.attr_name.clone().unwrap_or_default(),
        curve,
    })
}

fn layer_tracks(layer: &Layer<'_>, scene: &UnifiedScene) -> Vec<Track> {
    let mut tracks = Vec::new();

    for (&index, curves) in &layer.models {
        let Some(node) = scene.nodes.get(index) else {
            continue;
        };
        let (scale, _, translation) = node.transform.to_scale_rotation_translation();
        let data = node.transform_data.clone().unwrap_or_default();

        if let Some(t) = curves.translation {
            tracks.push(vector_track(index, &node.name, TrackProperty::Position, t, translation));
        }
        if let Some(r) = curves.rotation {
            let (times, values) = rotation_keys(r, &data);
            tracks.push(Track {
                name: format!("{}.{}", node.name, TrackProperty::Rotation.path()),
                node: index,
                property: TrackProperty::Rotation,
                times,
                values: TrackValues::Quaternions(values),
            });
        }
        if let Some(s) = curves.scale {
            tracks.push(vector_track(index, &node.name, TrackProperty::Scale, s, scale));
        }
    }

    tracks.extend(layer.morphs.iter().filter_map(|m| morph_track(scene, m)));
    tracks
}

/// Sorted, de-duplicated union of the key times of all axes.
fn merged_times(axes: &[Option<&Curve>; 3]) -> Vec<f64> {
    let mut times: Vec<f64> = axes.iter().flatten().flat_map(|c| c.times.iter().copied()).collect();
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// Sample every axis at `times`, holding the previous value where an axis
/// has no key.
fn hold_samples(times: &[f64], axes: &[Option<&Curve>; 3], initial: [f64; 3]) -> Vec<[f64; 3]> {
    let mut current = initial;
    times
        .iter()
        .map(|&time| {
            for (value, axis) in current.iter_mut().zip(axes) {
                if let Some(v) = axis.and_then(|curve| curve.value_at(time)) {
                    *value = v;
                }
            }
            current
        })
        .collect()
}

fn vector_track(
    node: usize,
    node_name: &str,
    property: TrackProperty,
    curves: &CurveNode,
    initial: Vec3,
) -> Track {
    let axes = curves.axes();
    let times = merged_times(&axes);
    let samples = hold_samples(&times, &axes, [initial.x as f64, initial.y as f64, initial.z as f64]);

    Track {
        name: format!("{}.{}", node_name, property.path()),
        node,
        property,
        times: times.iter().map(|&t| t as f32).collect(),
        values: TrackValues::Vectors(
            samples
                .iter()
                .map(|s| Vec3::new(s[0] as f32, s[1] as f32, s[2] as f32))
                .collect(),
        ),
    }
}

/// Insert keys so no two consecutive values are 180 degrees or more apart.
///
/// The sub-step count is `span / 180` without rounding, so the last
/// inserted key may sit closer to the next original key than the others.
fn interpolate_rotations(curve: &Curve) -> Curve {
    let mut out = Curve::default();
    for (i, (&time, &value)) in curve.times.iter().zip(&curve.values).enumerate() {
        if i > 0 {
            let (t0, v0) = (curve.times[i - 1], curve.values[i - 1]);
            let span = value - v0;
            if span.abs() >= MAX_ROTATION_STEP {
                let steps = span.abs() / MAX_ROTATION_STEP;
                let step = span / steps;
                let interval = (time - t0) / steps;
                let mut k = 1.0;
                let mut t = t0 + interval;
                while t < time {
                    out.times.push(t);
                    out.values.push(v0 + k * step);
                    k += 1.0;
                    t = t0 + k * interval;
                }
            }
        }
        out.times.push(time);
        out.values.push(value);
    }
    out
}

/// Quaternion keys of a rotation curve node, with pre- and post-rotation
/// folded in.
fn rotation_keys(curves: &CurveNode, data: &TransformData) -> (Vec<f32>, Vec<Quat>) {
    let x = curves.x.as_ref().map(interpolate_rotations);
    let y = curves.y.as_ref().map(interpolate_rotations);
    let z = curves.z.as_ref().map(interpolate_rotations);
    let axes = [x.as_ref(), y.as_ref(), z.as_ref()];

    let initial = data.rotation.unwrap_or(Vec3::ZERO);
    let times = merged_times(&axes);
    let samples = hold_samples(&times, &axes, [initial.x as f64, initial.y as f64, initial.z as f64]);

    let order = data.euler_order;
    let pre = data.pre_rotation.map(|r| order.to_quat_degrees(r));
    let post = data.post_rotation.map(|r| order.to_quat_degrees(r).inverse());

    let values = samples
        .iter()
        .map(|s| {
            let mut q = data
                .euler_order
                .to_quat_degrees(Vec3::new(s[0] as f32, s[1] as f32, s[2] as f32));
            if let Some(pre) = pre {
                q = pre * q;
            }
            if let Some(post) = post {
                q *= post;
            }
            q
        })
        .collect();

    (times.iter().map(|&t| t as f32).collect(), values)
}

fn morph_track(scene: &UnifiedScene, morph: &MorphCurve<'_>) -> Option<Track> {
    let node = scene.nodes.get(morph.node)?;
    let index = node
        .geometry
        .and_then(|g| scene.geometries.get(g))
        .and_then(Geometry::as_mesh)
        .and_then(|mesh| mesh.morph_target_index(&morph.name));
    let Some(index) = index else {
        warn!("Morph target {} not found on {}", morph.name, node.name);
        return None;
    };

    let property = TrackProperty::MorphWeight(index);
    Some(Track {
        name: format!("{}.{}", node.name, property.path()),
        node: morph.node,
        property,
        times: morph.curve.times.iter().map(|&t| t as f32).collect(),
        values: TrackValues::Scalars(morph.curve.values.iter().map(|&v| (v / 100.0) as f32).collect()),
    })
}
