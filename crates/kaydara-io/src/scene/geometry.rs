//! Geometry types for UnifiedScene.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A geometry representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Geometry {
    /// Non-indexed triangle mesh.
    Mesh(TriangleMesh),
    /// Polyline, e.g. an evaluated NURBS curve.
    Lines(LineMesh),
}

impl Geometry {
    /// Get approximate bounding box.
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Geometry::Mesh(mesh) => mesh.compute_bounds(),
            Geometry::Lines(lines) => lines.compute_bounds(),
        }
    }

    pub fn as_mesh(&self) -> Option<&TriangleMesh> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            Geometry::Lines(_) => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut TriangleMesh> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            Geometry::Lines(_) => None,
        }
    }

    pub fn as_lines(&self) -> Option<&LineMesh> {
        match self {
            Geometry::Lines(lines) => Some(lines),
            Geometry::Mesh(_) => None,
        }
    }
}

/// A contiguous range of vertices drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawGroup {
    /// First vertex of the range.
    pub start: usize,
    /// Number of vertices in the range.
    pub count: usize,
    /// Index into the owning node's material list.
    pub material_index: usize,
}

/// Absolute positions of one blend shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphTarget {
    pub name: String,
    pub positions: Vec<Vec3>,
}

/// A triangle mesh.
///
/// Every triangle corner is its own vertex: all attribute buffers are
/// parallel to `positions` and `indices` is `0..positions.len()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Geometry name.
    pub name: String,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex normals (optional).
    pub normals: Option<Vec<Vec3>>,
    /// Texture coordinate sets, in layer order.
    pub uv_sets: Vec<Vec<Vec2>>,
    /// Vertex colors in linear space (optional).
    pub colors: Option<Vec<Vec4>>,
    /// Four joint slots per vertex.
    pub skin_indices: Option<Vec<[u32; 4]>>,
    /// Four joint weights per vertex.
    pub skin_weights: Option<Vec<[f32; 4]>>,
    /// Material ranges.
    pub groups: Vec<DrawGroup>,
    /// Blend shapes.
    pub morph_targets: Vec<MorphTarget>,
    /// Triangle indices (3 indices per triangle).
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_morph_targets(&self) -> bool {
        !self.morph_targets.is_empty()
    }

    /// Position of a morph target in `morph_targets`, by name.
    pub fn morph_target_index(&self, name: &str) -> Option<usize> {
        self.morph_targets.iter().position(|t| t.name == name)
    }

    /// Compute the bounding box.
    pub fn compute_bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.positions)
    }

    /// Compute normals if not present.
    pub fn compute_normals(&mut self) {
        if self.normals.is_some() {
            return;
        }

        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i0.max(i1).max(i2) >= self.positions.len() {
                continue;
            }

            let v0 = self.positions[i0];
            let edge1 = self.positions[i1] - v0;
            let edge2 = self.positions[i2] - v0;
            let normal = edge1.cross(edge2);

            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }

        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }

        self.normals = Some(normals);
    }

    /// Scale every vertex's skin weights so they sum to one.
    ///
    /// Vertices with no weight at all are left untouched.
    pub fn normalize_skin_weights(&mut self) {
        let Some(weights) = self.skin_weights.as_mut() else {
            return;
        };
        for w in weights.iter_mut() {
            let sum: f32 = w.iter().sum();
            if sum > 0.0 {
                for value in w.iter_mut() {
                    *value /= sum;
                }
            }
        }
    }
}

/// A line mesh for curves and wireframes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineMesh {
    /// Geometry name.
    pub name: String,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Line segment indices (2 indices per line segment).
    pub indices: Vec<u32>,
}

impl LineMesh {
    /// Create a new empty line mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of line segments.
    pub fn line_count(&self) -> usize {
        self.indices.len() / 2
    }

    /// Add a polyline (connected line segments).
    pub fn add_polyline(&mut self, points: &[Vec3]) {
        if points.len() < 2 {
            return;
        }

        let start_idx = self.positions.len() as u32;
        self.positions.extend_from_slice(points);
        for i in 0..(points.len() as u32 - 1) {
            self.indices.push(start_idx + i);
            self.indices.push(start_idx + i + 1);
        }
    }

    /// Compute the bounding box.
    pub fn compute_bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.positions)
    }
}

/// NURBS curve definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NurbsCurve {
    /// Curve degree.
    pub degree: usize,
    /// Control points (w is weight).
    pub control_points: Vec<Vec4>,
    /// Knot vector.
    pub knots: Vec<f64>,
    /// First usable knot index.
    pub start_knot: usize,
    /// Last usable knot index.
    pub end_knot: usize,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }
}

impl BoundingBox {
    /// Create a bounding box from points.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::default();
        for p in points {
            bounds.expand_point(*p);
        }
        bounds
    }

    /// Check if the bounding box is empty.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand to include a point.
    pub fn expand_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Expand to include another bounding box.
    pub fn expand(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Get the center of the bounding box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the bounding box.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}
