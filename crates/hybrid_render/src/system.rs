//! Frame driver
//!
//! [`RenderSystem`] owns the [`RenderingContext`] and runs a scene's enabled
//! passes once per frame, strictly in list order, on the calling thread.

use crate::backend::GraphicsBackend;
use crate::config::RenderConfig;
use crate::passes::{attach_passes, render_pass};
use crate::render::{RenderResult, RenderingContext};
use crate::resources::ResourceInbox;
use crate::scene::Scene;

/// Entry point of the pipeline
#[derive(Debug)]
pub struct RenderSystem {
    context: RenderingContext,
    frame: u64,
    shut_down: bool,
}

impl RenderSystem {
    /// Build the context on the configured backend and initialise both renderers
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        log::info!("Initializing render system...");
        Ok(Self::from_context(RenderingContext::new(config)?))
    }

    /// Build on an explicit backend
    pub fn with_backend(config: RenderConfig, backend: Box<dyn GraphicsBackend>) -> RenderResult<Self> {
        Ok(Self::from_context(RenderingContext::with_backend(config, backend)?))
    }

    fn from_context(context: RenderingContext) -> Self {
        Self {
            context,
            frame: 0,
            shut_down: false,
        }
    }

    /// Get the rendering context
    pub fn context(&self) -> &RenderingContext {
        &self.context
    }

    /// Get mutable access to the rendering context
    pub fn context_mut(&mut self) -> &mut RenderingContext {
        &mut self.context
    }

    /// Frames rendered so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Empty scene clearing to the configured colour
    pub fn new_scene(&self, name: impl Into<String>) -> Scene {
        let mut scene = Scene::new(name);
        scene.clear_colour = self.context.config().clear_colour;
        scene.camera.aspect = aspect_ratio(self.context.viewport());
        scene
    }

    /// Resolve the scene's pass targets and sources
    pub fn attach_scene(&mut self, scene: &mut Scene) {
        attach_passes(scene, &self.context.gpu.resources);
    }

    /// Upload whatever background loaders delivered since the last call
    pub fn drain_inbox(&mut self, inbox: &ResourceInbox) -> usize {
        let gpu = &mut self.context.gpu;
        let applied = gpu.resources.drain_inbox(gpu.backend.as_mut(), inbox);
        if applied > 0 {
            log::debug!("Applied {applied} loaded resources");
        }
        applied
    }

    /// Render one frame of `scene`.
    ///
    /// Re-attaches the pass list if it changed since the last frame and
    /// rebuilds the entity list if the tree changed. Never fails; problems
    /// are logged and the affected draws skipped.
    pub fn on_render(&mut self, scene: &mut Scene) {
        if self.shut_down {
            log::warn!("Render system is shut down, skipping frame of scene '{}'", scene.name);
            return;
        }
        if !scene.is_attached() {
            self.attach_scene(scene);
        }
        self.context.reset_frame_stats();
        scene.refresh_entities();

        let scene: &Scene = scene;
        for pass in scene.passes().iter().filter(|pass| pass.enabled) {
            render_pass(pass, scene, &mut self.context);
        }

        self.frame += 1;
        log::trace!(
            "Frame {} done: {} 3D draws in {} flushes, {} 2D draws in {} flushes",
            self.frame,
            self.context.renderer_3d.stats().total_draws(),
            self.context.renderer_3d.stats().flushes(),
            self.context.renderer_2d.stats().total_draws(),
            self.context.renderer_2d.stats().flushes()
        );
    }

    /// Destroy the renderers and release every resource. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.context.destroy();
        self.shut_down = true;
        log::info!("Render system shutdown complete after {} frames", self.frame);
    }
}

fn aspect_ratio((width, height): (u32, u32)) -> f32 {
    width as f32 / height.max(1) as f32
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, RecordingBackend};
    use crate::passes::{PassKind, RenderPass};

    #[test]
    fn test_render_attaches_lazily_and_counts_frames() {
        let mut system = RenderSystem::new(RenderConfig::default()).unwrap();
        let mut scene = Scene::new("test");
        scene.add_pass(RenderPass::new("ui", PassKind::Ui));

        system.on_render(&mut scene);
        assert!(scene.is_attached());
        system.on_render(&mut scene);
        assert_eq!(system.frame(), 2);
    }

    #[test]
    fn test_new_scene_uses_configured_clear_colour() {
        let config = RenderConfig::default().with_viewport(200, 100);
        let clear = config.clear_colour;
        let system = RenderSystem::new(config).unwrap();
        let scene = system.new_scene("configured");
        assert_eq!(scene.clear_colour, clear);
        approx::assert_relative_eq!(scene.camera.aspect, 2.0);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_stops_rendering() {
        let config = RenderConfig::default().with_backend(BackendKind::Recording);
        let mut system = RenderSystem::new(config).unwrap();
        let mut scene = Scene::new("test");
        scene.add_pass(RenderPass::new("geometry", PassKind::Geometry));

        system.shutdown();
        system.shutdown();
        assert!(system.is_shut_down());
        assert!(!system.context().renderer_3d.is_initialised());

        let before = system.context().backend_as::<RecordingBackend>().unwrap().commands().len();
        system.on_render(&mut scene);
        assert_eq!(system.frame(), 0);
        let after = system.context().backend_as::<RecordingBackend>().unwrap().commands().len();
        assert_eq!(before, after);
    }
}
