//! Animation clips and keyframe tracks.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Animated property of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackProperty {
    Position,
    Rotation,
    Scale,
    /// Influence of the morph target at this index.
    MorphWeight(usize),
}

impl TrackProperty {
    /// Property segment of a track path.
    pub fn path(&self) -> String {
        match self {
            TrackProperty::Position => "position".to_string(),
            TrackProperty::Rotation => "quaternion".to_string(),
            TrackProperty::Scale => "scale".to_string(),
            TrackProperty::MorphWeight(index) => format!("morphTargetInfluences[{}]", index),
        }
    }
}

/// Keyframe values, one per entry of `Track::times`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackValues {
    Vectors(Vec<Vec3>),
    Quaternions(Vec<Quat>),
    Scalars(Vec<f32>),
}

impl TrackValues {
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Vectors(v) => v.len(),
            TrackValues::Quaternions(v) => v.len(),
            TrackValues::Scalars(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyframes for one property of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track path, e.g. `"Arm.quaternion"` or `"Face.morphTargetInfluences[2]"`.
    pub name: String,
    /// Target node index.
    pub node: usize,
    pub property: TrackProperty,
    /// Key times in seconds, ascending.
    pub times: Vec<f32>,
    pub values: TrackValues,
}

impl Track {
    /// Time of the last key, or 0 for an empty track.
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

/// A named set of tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Build a clip whose duration covers every track.
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks.iter().map(Track::duration).fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }

    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }
}
