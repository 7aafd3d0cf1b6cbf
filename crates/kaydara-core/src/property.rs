//! Typed property values.
//!
//! A node's property list is an ordered sequence of loosely typed values. The
//! binary front end reads them with an explicit type tag; the text front end
//! infers them from literals. Accessors here coerce between numeric widths so
//! that downstream code never cares which front end produced a value.

/// A single entry of a node's property list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    /// Scalar value as f64. Strings are parsed, booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Property::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Property::I16(v) => Some(f64::from(*v)),
            Property::I32(v) => Some(f64::from(*v)),
            Property::I64(v) => Some(*v as f64),
            Property::F32(v) => Some(f64::from(*v)),
            Property::F64(v) => Some(*v),
            Property::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Scalar value as i64. Floats are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Property::Bool(v) => Some(i64::from(*v)),
            Property::I16(v) => Some(i64::from(*v)),
            Property::I32(v) => Some(i64::from(*v)),
            Property::I64(v) => Some(*v),
            Property::F32(v) => Some(*v as i64),
            Property::F64(v) => Some(*v as i64),
            Property::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer value, without coercion from floats or strings.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Property::I16(v) => Some(i64::from(*v)),
            Property::I32(v) => Some(i64::from(*v)),
            Property::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Property::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Property::BoolArray(_)
                | Property::I32Array(_)
                | Property::I64Array(_)
                | Property::F32Array(_)
                | Property::F64Array(_)
        )
    }

    /// Number of elements for arrays, 1 for scalars.
    pub fn len(&self) -> usize {
        match self {
            Property::BoolArray(v) => v.len(),
            Property::I32Array(v) => v.len(),
            Property::I64Array(v) => v.len(),
            Property::F32Array(v) => v.len(),
            Property::F64Array(v) => v.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Any numeric array (or a lone numeric scalar) widened to f64.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Property::BoolArray(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            Property::I32Array(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            Property::I64Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Property::F32Array(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            Property::F64Array(v) => Some(v.clone()),
            other => other.as_f64().map(|x| vec![x]),
        }
    }

    /// Any numeric array (or a lone numeric scalar) as i64.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Property::BoolArray(v) => Some(v.iter().map(|&b| i64::from(b)).collect()),
            Property::I32Array(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            Property::I64Array(v) => Some(v.clone()),
            Property::F32Array(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Property::F64Array(v) => Some(v.iter().map(|&x| x as i64).collect()),
            other => other.as_i64().map(|x| vec![x]),
        }
    }
}

/// Value of a `Properties70` entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeValue {
    Number(f64),
    Vector([f64; 3]),
    Text(String),
    Empty,
}

/// A typed `P` record from a `Properties70` block, flattened onto the node
/// that owns the block.
///
/// ```text
/// P: "Lcl Translation", "Lcl Translation", "", "A", 0, 10, 0
///     name               type               type2 flag value...
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    pub name: String,
    pub type_name: String,
    pub type_name2: String,
    pub flag: String,
    pub value: AttributeValue,
}

/// Attribute types whose value spans three properties.
const VECTOR_TYPES: &[&str] = &["Color", "ColorRGB", "Vector", "Vector3D"];

impl Attribute {
    /// Build an attribute from the property list of a `P` node.
    ///
    /// Returns `None` when the record has no name.
    pub fn from_properties(properties: &[Property]) -> Option<Self> {
        let text = |i: usize| {
            properties
                .get(i)
                .and_then(Property::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let name = properties.first()?.as_str()?.to_string();
        let type_name = text(1);

        let value = if VECTOR_TYPES.contains(&type_name.as_str()) || type_name.starts_with("Lcl ") {
            let component = |i: usize| properties.get(i).and_then(Property::as_f64).unwrap_or(0.0);
            AttributeValue::Vector([component(4), component(5), component(6)])
        } else {
            match properties.get(4) {
                Some(Property::String(s)) => AttributeValue::Text(s.clone()),
                Some(p) => p.as_f64().map_or(AttributeValue::Empty, AttributeValue::Number),
                None => AttributeValue::Empty,
            }
        };

        Some(Self {
            name,
            type_name,
            type_name2: text(2),
            flag: text(3),
            value,
        })
    }

    /// Scalar value; text values are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::Vector(v) => Some(v[0]),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::Empty => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|v| v as i64)
    }

    pub fn as_vec3(&self) -> Option<[f64; 3]> {
        match &self.value {
            AttributeValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}
