//! The stock pipeline: geometry, optional water, bloom and UI

use super::names::{
    BLOOM_BLUR, BLOOM_EXTRACT, BLOOM_FBO, COMPOSITE, FULLSCREEN_QUAD, HDR_FBO, MESH_SHADER, PING_FBO, PONG_FBO,
    REFLECTION_FBO, REFRACTION_FBO, SPRITE_SHADER, WATER,
};
use super::{PassKind, PassSource, RenderPass};
use crate::render::RenderingContext;
use crate::resources::{FramebufferDesc, Geometry, Material};

/// Parameters of the stock pass chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardPipeline {
    /// Water plane height, or `None` for a scene without water
    pub water_height: Option<f32>,
    /// Blur iterations of the bloom pass
    pub blur_iterations: u32,
    /// Bright-pass threshold
    pub bloom_threshold: f32,
}

impl Default for StandardPipeline {
    fn default() -> Self {
        Self {
            water_height: None,
            blur_iterations: 10,
            bloom_threshold: 1.0,
        }
    }
}

impl StandardPipeline {
    /// Include a water pass at `height`
    pub fn with_water(mut self, height: f32) -> Self {
        self.water_height = Some(height);
        self
    }

    /// Build the ordered pass list
    pub fn passes(&self) -> Vec<RenderPass> {
        let mut passes = vec![RenderPass::new("geometry", PassKind::Geometry).with_target(HDR_FBO)];
        let mut base = "geometry";
        if let Some(height) = self.water_height {
            passes.push(
                RenderPass::new(
                    "water",
                    PassKind::Water {
                        reflection: REFLECTION_FBO.to_string(),
                        refraction: REFRACTION_FBO.to_string(),
                        height,
                    },
                )
                .with_target(HDR_FBO),
            );
            base = "water";
        }

        passes.push(
            RenderPass::new(
                "bloomExtract",
                PassKind::BloomExtract {
                    threshold: self.bloom_threshold,
                },
            )
            .with_target(BLOOM_FBO)
            .reads(PassSource::colour(base))
            .with_material(BLOOM_EXTRACT),
        );
        passes.push(
            RenderPass::new(
                "bloomBlur",
                PassKind::BloomBlur {
                    iterations: self.blur_iterations,
                    pong: PONG_FBO.to_string(),
                },
            )
            .with_target(PING_FBO)
            .reads(PassSource::colour("bloomExtract"))
            .with_material(BLOOM_BLUR),
        );
        passes.push(
            RenderPass::new("composite", PassKind::Composite)
                .reads(PassSource::colour(base))
                .reads(PassSource::colour("bloomBlur"))
                .with_material(COMPOSITE),
        );
        passes.push(RenderPass::new("ui", PassKind::Ui).with_material(SPRITE_SHADER));
        passes
    }
}

/// Create the render targets, shaders, materials and full-screen geometry
/// the stock pipeline names. Safe to call more than once.
pub fn install_standard_resources(ctx: &mut RenderingContext) {
    if ctx.gpu.resources.has_framebuffer(HDR_FBO) {
        return;
    }
    let (width, height) = ctx.viewport();
    let (half_width, half_height) = ((width / 2).max(1), (height / 2).max(1));
    let backend = ctx.gpu.backend.as_mut();
    let resources = &mut ctx.gpu.resources;

    resources.create_framebuffer(backend, HDR_FBO, FramebufferDesc::hdr(width, height));
    resources.create_framebuffer(backend, BLOOM_FBO, FramebufferDesc::colour_only(width, height));
    resources.create_framebuffer(backend, PING_FBO, FramebufferDesc::colour_only(width, height));
    resources.create_framebuffer(backend, PONG_FBO, FramebufferDesc::colour_only(width, height));
    resources.create_framebuffer(backend, REFLECTION_FBO, FramebufferDesc::hdr(half_width, half_height));
    resources.create_framebuffer(backend, REFRACTION_FBO, FramebufferDesc::hdr(width, height));

    resources.create_shader(backend, MESH_SHADER);
    for name in [SPRITE_SHADER, WATER, BLOOM_EXTRACT, BLOOM_BLUR, COMPOSITE] {
        let shader = resources.create_shader(backend, name);
        resources.add_material(name, Material::new(shader));
    }
    resources.add_geometry(FULLSCREEN_QUAD, Geometry::fullscreen_quad());

    log::info!("Installed standard pipeline resources ({width}x{height})");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    #[test]
    fn test_pass_order_with_and_without_water() {
        let names = |pipeline: StandardPipeline| {
            pipeline
                .passes()
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(
            names(StandardPipeline::default()),
            ["geometry", "bloomExtract", "bloomBlur", "composite", "ui"]
        );
        assert_eq!(
            names(StandardPipeline::default().with_water(0.0)),
            ["geometry", "water", "bloomExtract", "bloomBlur", "composite", "ui"]
        );
    }

    #[test]
    fn test_composite_reads_the_last_scene_pass() {
        let passes = StandardPipeline::default().with_water(1.5).passes();
        let composite = passes.iter().find(|p| p.name() == "composite").unwrap();
        assert_eq!(composite.sources()[0], PassSource::colour("water"));
        assert_eq!(composite.sources()[1], PassSource::colour("bloomBlur"));
    }

    #[test]
    fn test_install_is_idempotent() {
        let mut ctx = RenderingContext::new(RenderConfig::default().with_viewport(64, 32)).unwrap();
        install_standard_resources(&mut ctx);
        let hdr = ctx.resources().find_framebuffer(HDR_FBO).unwrap();
        install_standard_resources(&mut ctx);

        assert_eq!(ctx.resources().find_framebuffer(HDR_FBO), Some(hdr));
        assert_eq!(ctx.resources().framebuffer(hdr).unwrap().width, 64);
        let reflection = ctx.resources().find_framebuffer(REFLECTION_FBO).unwrap();
        assert_eq!(ctx.resources().framebuffer(reflection).unwrap().height, 16);
        assert!(ctx.resources().find_geometry(FULLSCREEN_QUAD).is_some());
        assert!(ctx.resources().find_material(COMPOSITE).is_some());
    }
}
