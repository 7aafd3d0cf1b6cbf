//! Metadata types for UnifiedScene.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Scene-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneMetadata {
    /// Software that created the file.
    pub generator: Option<String>,
    /// Original file format (`"fbx-binary"` or `"fbx-ascii"`).
    pub source_format: Option<String>,
    /// FBX version number, e.g. 7400.
    pub version: Option<u32>,
    /// Unit system.
    pub units: Units,
    /// Raw `UnitScaleFactor` (centimetres per unit).
    pub unit_scale_factor: Option<f64>,
    /// Up axis.
    pub up_axis: Axis,
    /// Frames per second.
    pub frame_rate: Option<f64>,
    /// Custom properties.
    pub custom: IndexMap<String, MetadataValue>,
}

/// Node-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Model type string, e.g. `"Mesh"` or `"LimbNode"`.
    pub model_type: Option<String>,
    /// User-defined properties.
    pub custom: IndexMap<String, MetadataValue>,
}

/// Unit system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    /// Millimeters.
    Millimeters,
    /// Centimeters (FBX default).
    #[default]
    Centimeters,
    /// Meters.
    Meters,
    /// Inches.
    Inches,
    /// Feet.
    Feet,
}

impl Units {
    /// Map a `UnitScaleFactor` (size of one unit in centimetres).
    pub fn from_scale_factor(factor: f64) -> Self {
        let close = |v: f64| (factor - v).abs() < 1e-6;
        if close(0.1) {
            Units::Millimeters
        } else if close(100.0) {
            Units::Meters
        } else if close(2.54) {
            Units::Inches
        } else if close(30.48) {
            Units::Feet
        } else {
            Units::Centimeters
        }
    }

    /// Get the scale factor to convert to meters.
    pub fn to_meters_scale(&self) -> f32 {
        match self {
            Units::Millimeters => 0.001,
            Units::Centimeters => 0.01,
            Units::Meters => 1.0,
            Units::Inches => 0.0254,
            Units::Feet => 0.3048,
        }
    }
}

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Axis {
    X,
    #[default]
    Y,
    Z,
}

impl Axis {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
    /// Array of values.
    Array(Vec<MetadataValue>),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}
