//! Scene-wide uniform buffers
//!
//! Passes fill a handful of well-known uniform buffers (camera, lights,
//! bloom toggle, clip plane, blur direction) and hand the renderers a
//! [`SceneWideUniforms`] map; `begin` binds every entry at its binding point.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};

use crate::backend::GraphicsBackend;
use crate::foundation::math::{mat4_to_array, Mat4, Vec3};
use crate::resources::{ResourceManager, UniformBufferHandle};

/// Camera matrices
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
    /// World-space eye position (w = 1)
    pub position: [f32; 4],
}

impl CameraUniform {
    /// Pack camera matrices
    pub fn new(view: &Mat4, projection: &Mat4, position: &Vec3) -> Self {
        Self {
            view: mat4_to_array(view),
            projection: mat4_to_array(projection),
            position: [position.x, position.y, position.z, 1.0],
        }
    }
}

/// Single directional light
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    /// Direction the light travels (w unused)
    pub direction: [f32; 4],
    /// Light colour, intensity in w
    pub colour: [f32; 4],
    /// Ambient term
    pub ambient: [f32; 4],
}

impl Default for LightUniform {
    fn default() -> Self {
        Self {
            direction: [-0.3, -1.0, -0.2, 0.0],
            colour: [1.0, 1.0, 1.0, 1.0],
            ambient: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

/// Bloom toggle and tone-mapping exposure
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct BloomUniform {
    /// Non-zero when bloom is composited
    pub enabled: u32,
    /// Tone-mapping exposure
    pub exposure: f32,
    /// Brightness threshold of the extract pass
    pub threshold: f32,
    _padding: f32,
}

impl BloomUniform {
    /// Pack bloom parameters
    pub fn new(enabled: bool, exposure: f32, threshold: f32) -> Self {
        Self {
            enabled: u32::from(enabled),
            exposure,
            threshold,
            _padding: 0.0,
        }
    }
}

/// Clip plane `dot(plane.xyz, p) + plane.w >= 0` keeps `p`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ClipPlaneUniform {
    /// Plane coefficients
    pub plane: [f32; 4],
}

/// Blur direction of one ping-pong iteration
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct BlurUniform {
    /// Non-zero for the horizontal pass
    pub horizontal: u32,
    _padding: [u32; 3],
}

impl BlurUniform {
    /// Pack the blur direction
    pub fn new(horizontal: bool) -> Self {
        Self {
            horizontal: u32::from(horizontal),
            _padding: [0; 3],
        }
    }
}

/// Name to uniform-buffer mapping handed to a renderer's `begin`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneWideUniforms {
    buffers: BTreeMap<String, UniformBufferHandle>,
}

impl SceneWideUniforms {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, buffer: UniformBufferHandle) {
        self.buffers.insert(name.into(), buffer);
    }

    /// Look up an entry
    pub fn get(&self, name: &str) -> Option<UniformBufferHandle> {
        self.buffers.get(name).copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Bind every entry at its binding point
    pub fn bind(&self, backend: &mut dyn GraphicsBackend, resources: &ResourceManager) {
        for (name, handle) in &self.buffers {
            match resources.uniform_buffer(*handle) {
                Some(buffer) => backend.bind_uniform_buffer(buffer.binding, buffer.gpu),
                None => log::warn!("Uniform buffer '{name}' is no longer registered"),
            }
        }
    }
}

/// The pipeline's well-known uniform buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardUniforms {
    /// [`CameraUniform`] at binding 0
    pub camera: UniformBufferHandle,
    /// [`LightUniform`] at binding 1
    pub lights: UniformBufferHandle,
    /// [`BloomUniform`] at binding 2
    pub bloom: UniformBufferHandle,
    /// [`ClipPlaneUniform`] at binding 3
    pub clip_plane: UniformBufferHandle,
    /// [`BlurUniform`] at binding 4
    pub blur: UniformBufferHandle,
}

impl StandardUniforms {
    /// Registered name of the camera buffer
    pub const CAMERA: &'static str = "camera";
    /// Registered name of the light buffer
    pub const LIGHTS: &'static str = "lights";
    /// Registered name of the bloom buffer
    pub const BLOOM: &'static str = "bloom";
    /// Registered name of the clip-plane buffer
    pub const CLIP_PLANE: &'static str = "clipPlane";
    /// Registered name of the blur buffer
    pub const BLUR: &'static str = "blur";

    /// Allocate the standard buffers
    pub fn create(backend: &mut dyn GraphicsBackend, resources: &mut ResourceManager) -> Self {
        let mut create = |name: &str, binding: u32, size: usize| {
            resources.create_uniform_buffer(backend, name, binding, size)
        };
        Self {
            camera: create(Self::CAMERA, 0, std::mem::size_of::<CameraUniform>()),
            lights: create(Self::LIGHTS, 1, std::mem::size_of::<LightUniform>()),
            bloom: create(Self::BLOOM, 2, std::mem::size_of::<BloomUniform>()),
            clip_plane: create(Self::CLIP_PLANE, 3, std::mem::size_of::<ClipPlaneUniform>()),
            blur: create(Self::BLUR, 4, std::mem::size_of::<BlurUniform>()),
        }
    }

    /// Every standard buffer, as handed to `begin`
    pub fn scene_wide(&self) -> SceneWideUniforms {
        let mut uniforms = SceneWideUniforms::new();
        uniforms.insert(Self::CAMERA, self.camera);
        uniforms.insert(Self::LIGHTS, self.lights);
        uniforms.insert(Self::BLOOM, self.bloom);
        uniforms.insert(Self::CLIP_PLANE, self.clip_plane);
        uniforms.insert(Self::BLUR, self.blur);
        uniforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCommand, RecordingBackend};

    #[test]
    fn test_uniform_layouts_are_std140_friendly() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
        assert_eq!(std::mem::size_of::<LightUniform>(), 48);
        assert_eq!(std::mem::size_of::<BloomUniform>(), 16);
        assert_eq!(std::mem::size_of::<BlurUniform>(), 16);
    }

    #[test]
    fn test_scene_wide_bind() {
        let mut backend = RecordingBackend::new();
        let mut resources = ResourceManager::new(&mut backend, (8, 8));
        let standard = StandardUniforms::create(&mut backend, &mut resources);
        let uniforms = standard.scene_wide();
        assert_eq!(uniforms.len(), 5);
        assert_eq!(uniforms.get(StandardUniforms::BLOOM), Some(standard.bloom));

        backend.clear_log();
        uniforms.bind(&mut backend, &resources);
        assert_eq!(backend.count(|c| matches!(c, GpuCommand::BindUniformBuffer { .. })), 5);
    }
}
