//! Tone-mapped combination of the sharp image and the blurred bloom

use super::{bind_target, draw_fullscreen, Resolved};
use crate::foundation::math::BLACK;
use crate::render::{BloomUniform, GpuState, RenderResult, RenderingContext};
use crate::scene::Scene;

/// Threshold written alongside the composite parameters; only the extract
/// pass reads it.
const UNUSED_THRESHOLD: f32 = 1.0;

pub(super) fn render(resolved: &Resolved, scene: &Scene, ctx: &mut RenderingContext) -> RenderResult<()> {
    bind_target(ctx, resolved.target, Some(BLACK), true);
    ctx.state.apply(ctx.gpu.backend.as_mut(), GpuState::empty());
    ctx.write_uniform(
        ctx.uniforms.bloom,
        &BloomUniform::new(scene.bloom_enabled, scene.exposure, UNUSED_THRESHOLD),
    );
    let textures = [resolved.source(0), resolved.source(1)];
    draw_fullscreen(ctx, resolved, &textures)
}
