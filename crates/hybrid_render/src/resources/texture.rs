//! Textures, sub-texture regions and shader programs

use super::TextureHandle;
use crate::backend::{GpuProgramId, GpuTextureId, TextureDesc};

/// Texture tracked by the resource layer.
///
/// A texture registered before its pixels arrive is *pending*: it has a
/// handle and a name but no GPU object yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Size and format
    pub desc: TextureDesc,
    /// Backend object, `None` while pending
    pub gpu: Option<GpuTextureId>,
}

impl Texture {
    /// Whether pixel data has been uploaded
    pub fn is_loaded(&self) -> bool {
        self.gpu.is_some()
    }
}

/// Normalized rectangle in texture space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    /// Top-left corner
    pub min: [f32; 2],
    /// Bottom-right corner
    pub max: [f32; 2],
}

impl UvRect {
    /// The whole texture
    pub const FULL: Self = Self {
        min: [0.0, 0.0],
        max: [1.0, 1.0],
    };

    /// Create a rectangle
    pub const fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Region of a texture (sprite sheet cell, font glyph)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubTexture {
    /// Containing texture
    pub texture: TextureHandle,
    /// Region within it
    pub uv: UvRect,
}

/// Linked shader program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    /// Backend program
    pub program: GpuProgramId,
}
