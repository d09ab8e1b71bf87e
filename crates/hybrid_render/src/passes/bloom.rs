//! Bright-pass extraction and ping-pong blur

use super::{bind_target, colour_of, draw_fullscreen, missing, Resolved};
use crate::render::{BloomUniform, BlurUniform, GpuState, RenderResult, RenderingContext};
use crate::scene::Scene;

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

pub(super) fn render_extract(
    resolved: &Resolved,
    threshold: f32,
    scene: &Scene,
    ctx: &mut RenderingContext,
) -> RenderResult<()> {
    bind_target(ctx, resolved.target, Some(TRANSPARENT), false);
    ctx.state.apply(ctx.gpu.backend.as_mut(), GpuState::empty());
    ctx.write_uniform(
        ctx.uniforms.bloom,
        &BloomUniform::new(scene.bloom_enabled, scene.exposure, threshold),
    );
    draw_fullscreen(ctx, resolved, &[resolved.source(0)])
}

/// Alternate horizontal and vertical blurs between the target and the pong
/// framebuffer. Iteration 0 reads the source and writes the target.
pub(super) fn render_blur(resolved: &Resolved, iterations: u32, ctx: &mut RenderingContext) -> RenderResult<()> {
    let Some(pong) = resolved.pong else {
        return Err(missing("framebuffer", "blur pong target"));
    };
    ctx.state.apply(ctx.gpu.backend.as_mut(), GpuState::empty());

    let mut input = resolved.source(0);
    for i in 0..iterations.max(1) {
        let horizontal = i % 2 == 0;
        let output = if horizontal { resolved.target } else { pong };
        bind_target(ctx, output, None, false);
        ctx.write_uniform(ctx.uniforms.blur, &BlurUniform::new(horizontal));
        draw_fullscreen(ctx, resolved, &[input])?;
        input = colour_of(ctx, output);
    }
    Ok(())
}
