//! Sprites and text over the finished image

use super::{bind_target, run_2d, submit_entities, Resolved};
use crate::render::{GpuState, RenderResult, RendererKind, RenderingContext};
use crate::scene::Scene;

pub(super) fn render(resolved: &Resolved, scene: &Scene, ctx: &mut RenderingContext) -> RenderResult<()> {
    bind_target(ctx, resolved.target, None, false);
    ctx.state.apply(ctx.gpu.backend.as_mut(), GpuState::BLEND);

    let shader = resolved.material.and_then(|m| ctx.gpu.resources.material(m)).map(|m| m.shader);
    run_2d(ctx, shader, |ctx| submit_entities(scene, ctx, RendererKind::Renderer2D))
}
