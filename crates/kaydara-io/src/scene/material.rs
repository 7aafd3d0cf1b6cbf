//! Material types for UnifiedScene.

use glam::{Vec2, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lighting model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadingModel {
    #[default]
    Phong,
    Lambert,
}

/// Material parameter a texture feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapSlot {
    /// Base color.
    Color,
    Bump,
    AmbientOcclusion,
    Displacement,
    Emissive,
    Normal,
    /// Reflection (environment) map.
    Environment,
    Specular,
    Alpha,
}

/// Material definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Material name.
    pub name: String,
    /// Object id in the source file; `None` for generated materials.
    pub fbx_id: Option<i64>,
    pub shading: ShadingModel,
    /// Diffuse color (linear RGB).
    pub color: Vec3,
    /// Emissive color (linear RGB).
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    /// Specular color (linear RGB).
    pub specular: Vec3,
    pub shininess: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub reflectivity: f32,
    pub bump_scale: f32,
    pub displacement_scale: f32,
    /// Textures by slot.
    pub maps: IndexMap<MapSlot, TextureRef>,
    /// Multiply the color by vertex colors.
    pub vertex_colors: bool,
    /// Material is used by a mesh with morph targets.
    pub morph_targets: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            fbx_id: None,
            shading: ShadingModel::Phong,
            color: Vec3::ONE,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            specular: Vec3::splat(0x11 as f32 / 255.0),
            shininess: 30.0,
            opacity: 1.0,
            transparent: false,
            reflectivity: 1.0,
            bump_scale: 1.0,
            displacement_scale: 1.0,
            maps: IndexMap::new(),
            vertex_colors: false,
            morph_targets: false,
        }
    }
}

impl Material {
    /// Create a new default material.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a simple colored material.
    pub fn colored(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            color,
            ..Default::default()
        }
    }

    pub fn map(&self, slot: MapSlot) -> Option<&TextureRef> {
        self.maps.get(&slot)
    }
}

/// Reference to a texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureRef {
    /// Index into the scene's texture array.
    pub texture_index: usize,
    /// Texture coordinate set to use.
    pub texcoord: u32,
}

impl TextureRef {
    pub fn new(texture_index: usize) -> Self {
        Self {
            texture_index,
            texcoord: 0,
        }
    }
}

/// Color space of texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Linear,
    Srgb,
}

/// Texture data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Texture {
    /// Texture name.
    pub name: String,
    /// Object id in the source file.
    pub fbx_id: Option<i64>,
    /// Image source.
    pub source: ImageSource,
    /// Sampler settings.
    pub sampler: Sampler,
    /// UV repeat factor.
    pub repeat: Vec2,
    /// UV offset.
    pub offset: Vec2,
    /// Set when the texture feeds a color slot.
    pub color_space: ColorSpace,
}

impl Texture {
    pub fn new(name: impl Into<String>, source: ImageSource) -> Self {
        Self {
            name: name.into(),
            fbx_id: None,
            source,
            sampler: Sampler::default(),
            repeat: Vec2::ONE,
            offset: Vec2::ZERO,
            color_space: ColorSpace::Linear,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.source, ImageSource::Placeholder)
    }
}

/// Image source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Embedded image data.
    Embedded {
        /// MIME type (e.g., "image/png").
        mime_type: String,
        /// Raw image data.
        data: Vec<u8>,
    },
    /// External file reference.
    External {
        /// File path or URI.
        uri: String,
    },
    /// Image that could not be resolved.
    Placeholder,
}

/// Texture sampler settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sampler {
    /// U (horizontal) wrapping mode.
    pub wrap_u: Wrap,
    /// V (vertical) wrapping mode.
    pub wrap_v: Wrap,
}

/// Texture wrap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Wrap {
    /// Clamp to edge.
    ClampToEdge,
    /// Repeat.
    #[default]
    Repeat,
}

impl Wrap {
    /// Decode a `WrapModeU`/`WrapModeV` value.
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Wrap::Repeat
        } else {
            Wrap::ClampToEdge
        }
    }
}
