//! Opaque geometry into the HDR target

use super::{bind_target, run_3d, submit_entities, Resolved};
use crate::render::{GpuState, RenderResult, RendererKind, RenderingContext};
use crate::scene::{MeshLayer, Scene};

pub(super) fn render(resolved: &Resolved, scene: &Scene, ctx: &mut RenderingContext) -> RenderResult<()> {
    bind_target(ctx, resolved.target, Some(scene.clear_colour), true);

    let mut state = GpuState::DEPTH_TEST | GpuState::CULL_FACE;
    if scene.wireframe {
        state |= GpuState::WIREFRAME;
    }
    ctx.state.apply(ctx.gpu.backend.as_mut(), state);

    ctx.write_uniform(ctx.uniforms.camera, &scene.camera.uniform());
    ctx.write_uniform(ctx.uniforms.lights, &scene.light);

    run_3d(ctx, None, |ctx| {
        submit_entities(scene, ctx, RendererKind::Renderer3D(MeshLayer::Opaque));
    })
}
