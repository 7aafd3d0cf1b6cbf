//! UnifiedScene: the typed scene a decode produces.

pub mod animation;
pub mod geometry;
pub mod material;
pub mod metadata;

pub use animation::*;
pub use geometry::*;
pub use material::*;
pub use metadata::*;

use glam::{Mat4, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The decoded scene.
///
/// Nodes live in an arena and refer to each other by index; geometries,
/// materials, textures and skins are shared through their indices in the
/// scene collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedScene {
    /// Scene nodes (hierarchy).
    pub nodes: Vec<SceneNode>,
    /// Root node indices.
    pub roots: Vec<usize>,
    /// Geometry data.
    pub geometries: Vec<Geometry>,
    /// Materials.
    pub materials: Vec<Material>,
    /// Textures.
    pub textures: Vec<Texture>,
    /// Skin bindings.
    pub skins: Vec<Skin>,
    /// Animation clips.
    pub animations: Vec<AnimationClip>,
    /// Scene metadata.
    pub metadata: SceneMetadata,
    /// Format-specific extensions.
    pub extensions: ExtensionData,
}

impl UnifiedScene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the total number of geometries.
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Add a node without attaching it and return its index.
    pub fn add_node(&mut self, node: SceneNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        index
    }

    /// Add a root node and return its index.
    pub fn add_root(&mut self, node: SceneNode) -> usize {
        let index = self.add_node(node);
        self.roots.push(index);
        index
    }

    /// Add a child node to a parent and return its index.
    pub fn add_child(&mut self, parent: usize, node: SceneNode) -> usize {
        let index = self.add_node(node);
        self.attach(parent, index);
        index
    }

    /// Make an existing node a child of `parent`.
    ///
    /// The node is detached from its previous parent (or the roots) first.
    pub fn attach(&mut self, parent: usize, child: usize) {
        if parent >= self.nodes.len() || child >= self.nodes.len() || parent == child {
            return;
        }
        self.detach(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Remove a node from its parent's children or from the roots.
    pub fn detach(&mut self, child: usize) {
        match self.nodes.get(child).and_then(|n| n.parent) {
            Some(parent) => self.nodes[parent].children.retain(|&c| c != child),
            None => self.roots.retain(|&r| r != child),
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
    }

    /// Add a geometry and return its index.
    pub fn add_geometry(&mut self, geometry: Geometry) -> usize {
        let index = self.geometries.len();
        self.geometries.push(geometry);
        index
    }

    /// Add a material and return its index.
    pub fn add_material(&mut self, material: Material) -> usize {
        let index = self.materials.len();
        self.materials.push(material);
        index
    }

    /// Add a texture and return its index.
    pub fn add_texture(&mut self, texture: Texture) -> usize {
        let index = self.textures.len();
        self.textures.push(texture);
        index
    }

    /// Find the first node with the given (sanitized) name.
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Find the animation clip with the given name.
    pub fn find_clip(&self, name: &str) -> Option<&AnimationClip> {
        self.animations.iter().find(|c| c.name == name)
    }

    /// Compute the scene bounding box in world space.
    pub fn compute_bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::default();
        for (_, node, world) in self.traverse() {
            let Some(geometry) = node.geometry.and_then(|g| self.geometries.get(g)) else {
                continue;
            };
            let local = geometry.bounds();
            if local.is_empty() {
                continue;
            }
            for corner in local.corners() {
                bounds.expand_point(world.transform_point3(corner));
            }
        }
        bounds
    }

    /// Iterate over all nodes with their world transforms.
    pub fn traverse(&self) -> impl Iterator<Item = (usize, &SceneNode, Mat4)> {
        SceneTraverser::new(self)
    }
}

/// What a scene node represents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Plain transform node.
    #[default]
    Group,
    /// Skeleton joint.
    Bone,
    /// Triangle mesh (geometry + materials).
    Mesh,
    /// Polyline (evaluated NURBS curve).
    Line,
    /// Camera.
    Camera(Camera),
    /// Light.
    Light(Light),
    /// Camera or light without attribute data.
    Object,
}

/// A node in the scene graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneNode {
    /// Sanitized node name, usable in track paths.
    pub name: String,
    /// Name as stored in the file.
    pub original_name: String,
    /// Object id in the source file.
    pub fbx_id: Option<i64>,
    /// Node kind.
    pub kind: NodeKind,
    /// Local transform.
    pub transform: Mat4,
    /// World transform.
    pub world_transform: Mat4,
    /// Parent node index.
    pub parent: Option<usize>,
    /// Child node indices.
    pub children: Vec<usize>,
    /// Geometry index (if this node has geometry).
    pub geometry: Option<usize>,
    /// Material indices, one per draw group material slot.
    pub materials: Vec<usize>,
    /// Skin index for skinned meshes.
    pub skin: Option<usize>,
    /// World-space point the node is aimed at.
    pub look_at: Option<Vec3>,
    /// Transform components the local matrix was composed from.
    pub transform_data: Option<TransformData>,
    /// Whether this node is visible.
    pub visible: bool,
    /// Node metadata.
    pub metadata: NodeMetadata,
}

impl SceneNode {
    /// Create a new named node.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            original_name: name.clone(),
            name,
            transform: Mat4::IDENTITY,
            world_transform: Mat4::IDENTITY,
            visible: true,
            ..Default::default()
        }
    }

    /// Set the node kind.
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the transform.
    pub fn transformed(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_mesh(&self) -> bool {
        self.kind == NodeKind::Mesh
    }

    pub fn is_bone(&self) -> bool {
        self.kind == NodeKind::Bone
    }
}

/// Order in which Euler rotations are composed.
///
/// `Xyz` means the matrix is `Rx * Ry * Rz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EulerOrder {
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    #[default]
    Zyx,
}

/// How a node combines its parent's scale and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InheritType {
    /// Parent rotation, then parent scale, then local rotation and scale.
    #[default]
    RrSs,
    /// Parent rotation and scale applied around the local rotation.
    RSrs,
    /// Parent's local scale removed before combining.
    Rrs,
}

impl InheritType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => InheritType::RSrs,
            2 => InheritType::Rrs,
            _ => InheritType::RrSs,
        }
    }
}

/// Transform components of a model, rotations in degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub inherit_type: InheritType,
    pub euler_order: EulerOrder,
    pub translation: Option<Vec3>,
    pub pre_rotation: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub post_rotation: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub scaling_offset: Option<Vec3>,
    pub scaling_pivot: Option<Vec3>,
    pub rotation_offset: Option<Vec3>,
    pub rotation_pivot: Option<Vec3>,
    /// Parent matrices, filled in when the transform is composed.
    #[serde(skip)]
    pub parent_matrix: Option<Mat4>,
    #[serde(skip)]
    pub parent_matrix_world: Option<Mat4>,
}

/// Camera projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in degrees.
        fov: f32,
        aspect: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
    },
}

/// Camera attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    /// Focal length in millimetres, if the file provides one.
    pub focal_length: Option<f32>,
}

/// Light type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightType {
    Ambient,
    Point,
    Directional,
    Spot {
        /// Cone half angle in radians.
        angle: f32,
        penumbra: f32,
    },
}

/// Light attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub light_type: LightType,
    /// Linear RGB color.
    pub color: Vec3,
    pub intensity: f32,
    /// Cutoff distance, 0 for none.
    pub distance: f32,
    pub decay: f32,
    pub cast_shadow: bool,
}

/// Skeleton binding of a skinned mesh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skin {
    /// Bone node per joint slot; `None` when the bone model was never built.
    pub bones: Vec<Option<usize>>,
    /// Inverse bind matrix per joint slot.
    pub inverse_bind_matrices: Vec<Mat4>,
    /// World matrix of the mesh at bind time.
    pub bind_matrix: Mat4,
}

/// Format-specific extension data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionData {
    /// `GlobalSettings` values keyed by property name.
    pub fbx: IndexMap<String, serde_json::Value>,
}

/// Iterator for traversing the scene graph.
struct SceneTraverser<'a> {
    scene: &'a UnifiedScene,
    stack: Vec<(usize, Mat4)>,
}

impl<'a> SceneTraverser<'a> {
    fn new(scene: &'a UnifiedScene) -> Self {
        let stack: Vec<(usize, Mat4)> = scene
            .roots
            .iter()
            .rev()
            .map(|&idx| (idx, Mat4::IDENTITY))
            .collect();
        Self { scene, stack }
    }
}

impl<'a> Iterator for SceneTraverser<'a> {
    type Item = (usize, &'a SceneNode, Mat4);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, parent_transform) = self.stack.pop()?;
        let node = &self.scene.nodes[idx];
        let world_transform = parent_transform * node.transform;

        // Reverse push keeps children left-to-right.
        for &child_idx in node.children.iter().rev() {
            self.stack.push((child_idx, world_transform));
        }

        Some((idx, node, world_transform))
    }
}
