//! Explicitly constructed rendering context
//!
//! Owns everything a pass needs: the backend, the resource manager, both
//! batching renderers, the GPU state tracker and the standard uniform
//! buffers. Passes receive it by `&mut` reference; there is no global
//! renderer state.

use super::{Renderer2D, Renderer3D, RenderError, RenderResult, SceneWideUniforms, StandardUniforms, StateTracker};
use crate::backend::{create_backend, GraphicsBackend};
use crate::config::RenderConfig;
use crate::resources::ResourceManager;

/// Backend plus the resources living on it.
///
/// Kept apart from the renderers so a renderer method can borrow the
/// renderer and the GPU side mutably at the same time.
pub struct GpuContext {
    /// Active backend
    pub backend: Box<dyn GraphicsBackend>,
    /// Owner of every GPU resource
    pub resources: ResourceManager,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("backend", &self.backend.name())
            .field("resources", &self.resources)
            .finish()
    }
}

/// Everything the pass chain renders with
#[derive(Debug)]
pub struct RenderingContext {
    /// Backend and resources
    pub gpu: GpuContext,
    /// Quad and text renderer
    pub renderer_2d: Renderer2D,
    /// Mesh renderer
    pub renderer_3d: Renderer3D,
    /// Enabled capabilities
    pub state: StateTracker,
    /// Well-known uniform buffers
    pub uniforms: StandardUniforms,
    config: RenderConfig,
}

impl RenderingContext {
    /// Build a context on the backend selected by `config`
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        let backend = create_backend(config.backend);
        Self::with_backend(config, backend)
    }

    /// Build a context on an explicit backend
    pub fn with_backend(config: RenderConfig, mut backend: Box<dyn GraphicsBackend>) -> RenderResult<Self> {
        config.validate().map_err(|e| {
            log::error!("Invalid render configuration: {e}");
            RenderError::InvalidCapacity(e.to_string())
        })?;

        let units = config.texture_units.min(backend.max_texture_units());
        if units < config.texture_units {
            log::warn!(
                "Backend '{}' exposes {units} texture units, {} configured",
                backend.name(),
                config.texture_units
            );
        }

        let mut resources = ResourceManager::new(backend.as_mut(), config.viewport);
        let uniforms = StandardUniforms::create(backend.as_mut(), &mut resources);

        let mut renderer_2d = Renderer2D::new(units);
        renderer_2d.initialise(backend.as_mut(), config.renderer_2d)?;
        let mut renderer_3d = Renderer3D::new(units);
        renderer_3d.initialise(backend.as_mut(), config.renderer_3d)?;

        log::info!(
            "Rendering context ready on '{}' backend ({}x{})",
            backend.name(),
            config.viewport.0,
            config.viewport.1
        );

        Ok(Self {
            gpu: GpuContext { backend, resources },
            renderer_2d,
            renderer_3d,
            state: StateTracker::new(),
            uniforms,
            config,
        })
    }

    /// Configuration the context was built from
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Viewport size
    pub fn viewport(&self) -> (u32, u32) {
        self.config.viewport
    }

    /// Shorthand for the backend
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        self.gpu.backend.as_mut()
    }

    /// Shorthand for the resource manager
    pub fn resources(&self) -> &ResourceManager {
        &self.gpu.resources
    }

    /// Mutable shorthand for the resource manager
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.gpu.resources
    }

    /// The standard uniform buffers as a scene-wide mapping
    pub fn scene_uniforms(&self) -> SceneWideUniforms {
        self.uniforms.scene_wide()
    }

    /// Downcast the backend, e.g. to inspect a recording backend in tests
    pub fn backend_as<T: GraphicsBackend + 'static>(&self) -> Option<&T> {
        self.gpu.backend.as_any().downcast_ref::<T>()
    }

    /// Mutable downcast of the backend
    pub fn backend_as_mut<T: GraphicsBackend + 'static>(&mut self) -> Option<&mut T> {
        self.gpu.backend.as_any_mut().downcast_mut::<T>()
    }

    /// Write a value into a uniform buffer, logging failures
    pub fn write_uniform<T: bytemuck::Pod>(&mut self, buffer: crate::resources::UniformBufferHandle, value: &T) {
        if let Err(err) = self.gpu.resources.write_uniform(self.gpu.backend.as_mut(), buffer, value) {
            log::error!("Uniform upload failed: {err}");
        }
    }

    /// Clear per-frame renderer counters
    pub fn reset_frame_stats(&mut self) {
        self.renderer_2d.reset_frame_stats();
        self.renderer_3d.reset_frame_stats();
    }

    /// Destroy both renderers and release every resource. Idempotent.
    pub fn destroy(&mut self) {
        let backend = self.gpu.backend.as_mut();
        self.renderer_2d.destroy(backend);
        self.renderer_3d.destroy(backend);
        self.state.restore(backend);
        self.gpu.resources.release_all(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, BufferKind, NullBackend, RecordingBackend};
    use crate::config::BatchCapacity;

    #[test]
    fn test_context_initialises_both_renderers() {
        let ctx = RenderingContext::new(RenderConfig::default()).unwrap();
        assert!(ctx.renderer_2d.is_initialised());
        assert!(ctx.renderer_3d.is_initialised());
        assert!(ctx.backend_as::<NullBackend>().is_some());
    }

    #[test]
    fn test_unsupported_backend_uses_null() {
        let ctx = RenderingContext::new(RenderConfig::default().with_backend(BackendKind::OpenGl)).unwrap();
        assert!(ctx.backend_as::<NullBackend>().is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RenderConfig::default().with_renderer_3d(BatchCapacity::new(0, 10, 10));
        assert!(matches!(
            RenderingContext::new(config),
            Err(RenderError::InvalidCapacity(_))
        ));
    }

    #[test]
    fn test_destroy_releases_everything() {
        let config = RenderConfig::default().with_backend(BackendKind::Recording);
        let mut ctx = RenderingContext::new(config).unwrap();
        ctx.destroy();
        ctx.destroy();
        let backend = ctx.backend_as::<RecordingBackend>().unwrap();
        assert_eq!(backend.live_buffers(BufferKind::Vertex), 0);
        assert_eq!(backend.live_buffers(BufferKind::Uniform), 0);
        assert_eq!(backend.live_textures(), 0);
    }
}
