//! # Render Passes
//!
//! A scene renders through an ordered list of passes. Each pass binds one
//! target framebuffer, applies its GPU state, drives one or more renderer
//! begin/submit/end cycles and restores the state afterwards.
//!
//! ## Dependencies
//!
//! A pass that samples an earlier pass names it explicitly with a
//! [`PassSource`]. Sources are resolved in [`attach_passes`] once the whole
//! list is assembled: first every pass resolves its own target, then every
//! source is looked up against the finished list. A source that names an
//! unknown pass, a later pass, or a missing attachment falls back to the
//! default framebuffer's colour so the frame still completes.
//!
//! A disabled pass is skipped entirely; its framebuffer keeps whatever the
//! last enabled frame wrote.

mod bloom;
mod composite;
mod geometry;
mod standard;
mod ui;
mod water;

pub use standard::{install_standard_resources, StandardPipeline};

use crate::foundation::math::{Colour, Mat4};
use crate::render::{RenderError, RenderResult, RendererKind, RenderingContext};
use crate::resources::{
    Attachment, FramebufferHandle, GeometryHandle, MaterialHandle, ResourceManager, ShaderHandle, TextureHandle,
};
use crate::scene::Scene;

/// Well-known render target and resource names
pub mod names {
    /// HDR colour + depth target of the geometry and water passes
    pub const HDR_FBO: &str = "hdrFBO";
    /// Bright-pass output
    pub const BLOOM_FBO: &str = "bloomFBO";
    /// First blur ping-pong target
    pub const PING_FBO: &str = "pingFBO";
    /// Second blur ping-pong target
    pub const PONG_FBO: &str = "pongFBO";
    /// Water reflection target
    pub const REFLECTION_FBO: &str = "reflectionFBO";
    /// Water refraction target
    pub const REFRACTION_FBO: &str = "refractionFBO";
    /// Geometry covering the screen, drawn by post-processing passes
    pub const FULLSCREEN_QUAD: &str = "fullscreenQuad";
    /// Opaque mesh shader
    pub const MESH_SHADER: &str = "mesh";
    /// Sprite and text shader
    pub const SPRITE_SHADER: &str = "sprite";
    /// Water surface shader and material
    pub const WATER: &str = "water";
    /// Bright-pass shader and material
    pub const BLOOM_EXTRACT: &str = "bloomExtract";
    /// Blur shader and material
    pub const BLOOM_BLUR: &str = "bloomBlur";
    /// Composite shader and material
    pub const COMPOSITE: &str = "composite";
}

/// What a pass does
#[derive(Debug, Clone, PartialEq)]
pub enum PassKind {
    /// Opaque meshes into an HDR target, cleared to the scene colour
    Geometry,
    /// Full-screen bright pass over the first source
    BloomExtract {
        /// Brightness above which colour is kept
        threshold: f32,
    },
    /// Separable blur ping-ponging between the target and `pong`
    BloomBlur {
        /// Number of blur passes, alternating horizontal and vertical
        iterations: u32,
        /// Second ping-pong framebuffer
        pong: String,
    },
    /// Planar reflection and refraction sub-passes, then the water surfaces
    Water {
        /// Reflection framebuffer
        reflection: String,
        /// Refraction framebuffer
        refraction: String,
        /// Height of the water plane
        height: f32,
    },
    /// Sharp base (source 0) plus blurred bloom (source 1)
    Composite,
    /// Sprites and text, blended over the target
    Ui,
}

impl PassKind {
    fn uses_fullscreen_quad(&self) -> bool {
        matches!(self, Self::BloomExtract { .. } | Self::BloomBlur { .. } | Self::Composite)
    }
}

/// Attachment of an earlier pass's output that a pass samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSource {
    /// Producing pass
    pub pass: String,
    /// Attachment of its output framebuffer
    pub attachment: Attachment,
}

impl PassSource {
    /// Colour attachment 0 of `pass`
    pub fn colour(pass: impl Into<String>) -> Self {
        Self {
            pass: pass.into(),
            attachment: Attachment::Colour(0),
        }
    }
}

/// Handles a pass resolved at attach time
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolved {
    pub(crate) target: FramebufferHandle,
    pub(crate) output: FramebufferHandle,
    pub(crate) pong: Option<FramebufferHandle>,
    pub(crate) reflection: Option<FramebufferHandle>,
    pub(crate) refraction: Option<FramebufferHandle>,
    pub(crate) sources: Vec<TextureHandle>,
    pub(crate) material: Option<MaterialHandle>,
    pub(crate) fullscreen: Option<GeometryHandle>,
    pub(crate) fallback: TextureHandle,
}

impl Resolved {
    /// Source texture `n`, or the fallback when the pass declared fewer
    pub(crate) fn source(&self, n: usize) -> TextureHandle {
        self.sources.get(n).copied().unwrap_or(self.fallback)
    }
}

/// One stage of the per-frame pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    name: String,
    kind: PassKind,
    /// Disabled passes are skipped and keep last frame's output
    pub enabled: bool,
    index: usize,
    target: Option<String>,
    sources: Vec<PassSource>,
    material: Option<String>,
    persist_state: bool,
    resolved: Option<Resolved>,
}

impl RenderPass {
    /// Enabled pass rendering to the default framebuffer
    pub fn new(name: impl Into<String>, kind: PassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            index: 0,
            target: None,
            sources: Vec::new(),
            material: None,
            persist_state: false,
            resolved: None,
        }
    }

    /// Render into the named framebuffer
    pub fn with_target(mut self, framebuffer: impl Into<String>) -> Self {
        self.target = Some(framebuffer.into());
        self
    }

    /// Sample an earlier pass's output
    pub fn reads(mut self, source: PassSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Draw full-screen passes with the named material
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    /// Leave this pass's GPU state enabled for the next pass
    pub fn with_persisted_state(mut self) -> Self {
        self.persist_state = true;
        self
    }

    /// Start disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Pass name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pass kind
    pub fn kind(&self) -> &PassKind {
        &self.kind
    }

    /// Position in the owning scene's pass list
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
        self.resolved = None;
    }

    /// Declared sources
    pub fn sources(&self) -> &[PassSource] {
        &self.sources
    }

    /// Whether attach has resolved this pass
    pub fn is_attached(&self) -> bool {
        self.resolved.is_some()
    }

    /// Framebuffer this pass draws into (for ping-pong passes, the first one)
    pub fn target(&self) -> Option<FramebufferHandle> {
        self.resolved.as_ref().map(|r| r.target)
    }

    /// Durable output later passes may sample; valid until the scene is
    /// torn down. `None` before attach.
    pub fn frame_buffer(&self) -> Option<FramebufferHandle> {
        self.resolved.as_ref().map(|r| r.output)
    }

    /// Texture resolved for source `n`
    pub fn source_texture(&self, n: usize) -> Option<TextureHandle> {
        self.resolved.as_ref().and_then(|r| r.sources.get(n).copied())
    }

    fn resolve_target(&mut self, resources: &ResourceManager) {
        let default = resources.default_framebuffer();
        let pass = &self.name;
        let lookup = |name: &str| {
            resources.find_framebuffer(name).unwrap_or_else(|| {
                log::warn!("Pass '{pass}': framebuffer '{name}' missing, using the default framebuffer");
                default
            })
        };

        let target = self.target.as_deref().map_or(default, |name| lookup(name));
        let mut resolved = Resolved {
            target,
            output: target,
            pong: None,
            reflection: None,
            refraction: None,
            sources: Vec::new(),
            material: self.material.as_deref().and_then(|name| resources.find_material(name)),
            fullscreen: None,
            fallback: resources.fallback_texture(),
        };

        match &self.kind {
            PassKind::BloomBlur { iterations, pong } => {
                let pong = lookup(pong);
                resolved.pong = Some(pong);
                if (*iterations).max(1) % 2 == 0 {
                    resolved.output = pong;
                }
            }
            PassKind::Water {
                reflection, refraction, ..
            } => {
                resolved.reflection = Some(lookup(reflection));
                resolved.refraction = Some(lookup(refraction));
            }
            _ => {}
        }
        if self.kind.uses_fullscreen_quad() {
            resolved.fullscreen = resources.find_geometry(names::FULLSCREEN_QUAD);
        }
        self.resolved = Some(resolved);
    }

    fn resolve_sources(&mut self, resources: &ResourceManager, outputs: &[(String, usize, FramebufferHandle)]) {
        let fallback = resources.fallback_texture();
        let mut textures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let producer = outputs.iter().find(|(name, _, _)| *name == source.pass);
            let texture = match producer {
                Some((_, index, output)) if *index < self.index => {
                    resources.attachment_texture(*output, source.attachment).unwrap_or_else(|| {
                        log::warn!(
                            "Pass '{}': '{}' has no {:?} attachment, sampling the default framebuffer",
                            self.name,
                            source.pass,
                            source.attachment
                        );
                        fallback
                    })
                }
                Some(_) => {
                    log::warn!(
                        "Pass '{}' reads from later pass '{}', sampling the default framebuffer",
                        self.name,
                        source.pass
                    );
                    fallback
                }
                None => {
                    log::warn!(
                        "Pass '{}' reads from unknown pass '{}', sampling the default framebuffer",
                        self.name,
                        source.pass
                    );
                    fallback
                }
            };
            textures.push(texture);
        }
        if let Some(resolved) = self.resolved.as_mut() {
            resolved.sources = textures;
        }
    }
}

/// Resolve every pass of `scene` against the finished list.
///
/// Targets are resolved first so that sources can refer to any earlier
/// pass's output regardless of construction order.
pub fn attach_passes(scene: &mut Scene, resources: &ResourceManager) {
    for pass in scene.passes_mut() {
        pass.resolve_target(resources);
    }

    let outputs: Vec<(String, usize, FramebufferHandle)> = scene
        .passes()
        .iter()
        .filter_map(|pass| pass.frame_buffer().map(|output| (pass.name.clone(), pass.index, output)))
        .collect();
    for pass in scene.passes_mut() {
        pass.resolve_sources(resources, &outputs);
    }

    scene.mark_attached();
    log::debug!("Scene '{}': attached {} passes", scene.name, scene.passes().len());
}

/// Render one pass. Failures are logged and the frame continues.
pub fn render_pass(pass: &RenderPass, scene: &Scene, ctx: &mut RenderingContext) {
    let Some(resolved) = pass.resolved.as_ref() else {
        log::error!("Pass '{}' rendered before attach", pass.name);
        return;
    };
    log::trace!("Pass '{}' [{}] begin", pass.name, pass.index);

    let result = match &pass.kind {
        PassKind::Geometry => geometry::render(resolved, scene, ctx),
        PassKind::BloomExtract { threshold } => bloom::render_extract(resolved, *threshold, scene, ctx),
        PassKind::BloomBlur { iterations, .. } => bloom::render_blur(resolved, *iterations, ctx),
        PassKind::Water { height, .. } => water::render(resolved, *height, scene, ctx),
        PassKind::Composite => composite::render(resolved, scene, ctx),
        PassKind::Ui => ui::render(resolved, scene, ctx),
    };
    if let Err(err) = result {
        log::warn!("Pass '{}' degraded: {err}", pass.name);
    }

    if !pass.persist_state {
        ctx.state.restore(ctx.gpu.backend.as_mut());
    }
    log::trace!("Pass '{}' end", pass.name);
}

// === Helpers shared by the pass kinds ===

fn bind_target(ctx: &mut RenderingContext, framebuffer: FramebufferHandle, clear: Option<Colour>, depth: bool) {
    let (gpu, width, height) = match ctx.gpu.resources.framebuffer(framebuffer) {
        Some(fb) => (fb.gpu, fb.width, fb.height),
        None => {
            log::warn!("Render target is no longer registered, using the default framebuffer");
            let (width, height) = ctx.viewport();
            (None, width, height)
        }
    };
    let backend = ctx.gpu.backend.as_mut();
    backend.bind_framebuffer(gpu);
    backend.set_viewport(width, height);
    if clear.is_some() || depth {
        backend.clear(clear, depth);
    }
}

fn colour_of(ctx: &RenderingContext, framebuffer: FramebufferHandle) -> TextureHandle {
    ctx.gpu
        .resources
        .attachment_texture(framebuffer, Attachment::Colour(0))
        .unwrap_or_else(|| ctx.gpu.resources.fallback_texture())
}

fn submit_entities(scene: &Scene, ctx: &mut RenderingContext, kind: RendererKind) {
    for (entity, world) in scene.visible_entities() {
        entity.on_render(world, kind, ctx);
    }
}

fn run_3d(
    ctx: &mut RenderingContext,
    shader: Option<ShaderHandle>,
    body: impl FnOnce(&mut RenderingContext),
) -> RenderResult<()> {
    let uniforms = ctx.scene_uniforms();
    ctx.renderer_3d.begin(&mut ctx.gpu, shader, &uniforms)?;
    body(ctx);
    ctx.renderer_3d.end(&mut ctx.gpu)
}

fn run_2d(
    ctx: &mut RenderingContext,
    shader: Option<ShaderHandle>,
    body: impl FnOnce(&mut RenderingContext),
) -> RenderResult<()> {
    let uniforms = ctx.scene_uniforms();
    ctx.renderer_2d.begin(&mut ctx.gpu, shader, &uniforms)?;
    body(ctx);
    ctx.renderer_2d.end(&mut ctx.gpu)
}

/// Point the pass material at `textures` and draw the full-screen quad with it
fn draw_fullscreen(ctx: &mut RenderingContext, resolved: &Resolved, textures: &[TextureHandle]) -> RenderResult<()> {
    let Some(material) = resolved.material else {
        return Err(missing("material", "full-screen pass material"));
    };
    let Some(quad) = resolved.fullscreen else {
        return Err(missing("geometry", names::FULLSCREEN_QUAD));
    };
    if let Some(material) = ctx.gpu.resources.material_mut(material) {
        material.textures = textures.to_vec();
    }
    run_3d(ctx, None, |ctx| {
        // Rejections are logged by the renderer
        let _ = ctx
            .renderer_3d
            .submit(&mut ctx.gpu, quad, material, &Mat4::identity(), None);
    })
}

fn missing(kind: &'static str, name: &str) -> RenderError {
    let err = RenderError::MissingResource {
        kind,
        name: name.to_string(),
    };
    log::error!("{err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::resources::FramebufferDesc;

    fn resources() -> (RecordingBackend, ResourceManager) {
        let mut backend = RecordingBackend::new();
        let mut resources = ResourceManager::new(&mut backend, (8, 8));
        for name in ["a", "b"] {
            resources.create_framebuffer(&mut backend, name, FramebufferDesc::colour_only(8, 8));
        }
        (backend, resources)
    }

    #[test]
    fn test_sources_resolve_to_producer_colour() {
        let (_, resources) = resources();
        let mut scene = Scene::new("test");
        scene.add_pass(RenderPass::new("first", PassKind::Geometry).with_target("a"));
        scene.add_pass(
            RenderPass::new("second", PassKind::Composite)
                .with_target("b")
                .reads(PassSource::colour("first")),
        );
        attach_passes(&mut scene, &resources);

        let first_output = scene.render_pass(0).unwrap().frame_buffer().unwrap();
        let expected = resources.attachment_texture(first_output, Attachment::Colour(0));
        assert_eq!(scene.render_pass(1).unwrap().source_texture(0), expected);
        assert!(scene.is_attached());
    }

    #[test]
    fn test_sources_resolve_regardless_of_construction_order() {
        let (_, resources) = resources();
        let mut scene = Scene::new("test");
        scene.add_pass(RenderPass::new("reader", PassKind::Composite).reads(PassSource::colour("producer")));
        scene.insert_pass(0, RenderPass::new("producer", PassKind::Geometry).with_target("a"));
        attach_passes(&mut scene, &resources);

        let a = resources.find_framebuffer("a").unwrap();
        assert_eq!(
            scene.render_pass(1).unwrap().source_texture(0),
            resources.attachment_texture(a, Attachment::Colour(0))
        );
    }

    #[test]
    fn test_unresolvable_sources_fall_back_to_default() {
        let (_, resources) = resources();
        let mut scene = Scene::new("test");
        scene.add_pass(
            RenderPass::new("first", PassKind::Composite)
                .reads(PassSource::colour("nowhere"))
                .reads(PassSource::colour("later")),
        );
        scene.add_pass(RenderPass::new("later", PassKind::Geometry).with_target("b"));
        scene.add_pass(RenderPass::new("third", PassKind::Geometry).with_target("missingFBO"));
        attach_passes(&mut scene, &resources);

        let first = scene.render_pass(0).unwrap();
        assert_eq!(first.source_texture(0), Some(resources.fallback_texture()));
        assert_eq!(first.source_texture(1), Some(resources.fallback_texture()));
        assert_eq!(first.frame_buffer(), Some(resources.default_framebuffer()));
        assert_eq!(
            scene.render_pass(2).unwrap().frame_buffer(),
            Some(resources.default_framebuffer())
        );
    }

    #[test]
    fn test_blur_output_follows_iteration_parity() {
        let (_, resources) = resources();
        let blur = |iterations| {
            RenderPass::new(
                format!("blur{iterations}"),
                PassKind::BloomBlur {
                    iterations,
                    pong: "b".to_string(),
                },
            )
            .with_target("a")
        };
        let mut scene = Scene::new("test");
        scene.add_pass(blur(3));
        scene.add_pass(blur(4));
        attach_passes(&mut scene, &resources);

        assert_eq!(scene.render_pass(0).unwrap().frame_buffer(), resources.find_framebuffer("a"));
        assert_eq!(scene.render_pass(1).unwrap().frame_buffer(), resources.find_framebuffer("b"));
    }

    #[test]
    fn test_reordering_detaches() {
        let (_, resources) = resources();
        let mut scene = Scene::new("test");
        scene.add_pass(RenderPass::new("first", PassKind::Geometry));
        attach_passes(&mut scene, &resources);
        assert!(scene.render_pass(0).unwrap().is_attached());

        scene.add_pass(RenderPass::new("second", PassKind::Ui));
        assert!(!scene.is_attached());
        assert!(!scene.render_pass(0).unwrap().is_attached());
    }
}
