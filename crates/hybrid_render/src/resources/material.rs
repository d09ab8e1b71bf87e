//! Materials shared by reference across entities

use super::{ShaderHandle, TextureHandle};
use crate::foundation::math::{Colour, WHITE};

/// Shader, ordered texture list, tint and shininess.
///
/// Game logic may edit a material in place at any time through
/// [`ResourceManager::material_mut`](super::ResourceManager::material_mut);
/// renderers read the current values whenever they batch a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Program used when the renderer has no override
    pub shader: ShaderHandle,
    /// Textures in sampler order
    pub textures: Vec<TextureHandle>,
    /// Colour multiplied into the output
    pub tint: Colour,
    /// Specular exponent
    pub shininess: f32,
}

impl Material {
    /// Untextured white material
    pub fn new(shader: ShaderHandle) -> Self {
        Self {
            shader,
            textures: Vec::new(),
            tint: WHITE,
            shininess: 32.0,
        }
    }

    /// Set textures
    pub fn with_textures(mut self, textures: Vec<TextureHandle>) -> Self {
        self.textures = textures;
        self
    }

    /// Set tint
    pub fn with_tint(mut self, tint: Colour) -> Self {
        self.tint = tint;
        self
    }

    /// Set shininess
    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }
}
