//! Planar water
//!
//! Three renderer cycles: the opaque scene above the plane through a
//! mirrored camera into the reflection target, the opaque scene below the
//! plane into the refraction target, then the water surfaces sampling both
//! into the pass target. The surface draw does not clear, so it composes
//! over whatever the geometry pass left in a shared target.

use super::{bind_target, colour_of, missing, run_3d, submit_entities, Resolved};
use crate::render::{ClipPlaneUniform, GpuState, RenderResult, RendererKind, RenderingContext};
use crate::resources::{MaterialHandle, TextureHandle};
use crate::scene::{Component, MeshLayer, Scene};

pub(super) fn render(resolved: &Resolved, height: f32, scene: &Scene, ctx: &mut RenderingContext) -> RenderResult<()> {
    let (Some(reflection), Some(refraction)) = (resolved.reflection, resolved.refraction) else {
        return Err(missing("framebuffer", "water reflection/refraction target"));
    };
    let opaque = RendererKind::Renderer3D(MeshLayer::Opaque);
    let clipped = GpuState::DEPTH_TEST | GpuState::CULL_FACE | GpuState::CLIP_DISTANCE0;

    // Above the surface, seen from below it
    bind_target(ctx, reflection, Some(scene.clear_colour), true);
    ctx.state.apply(ctx.gpu.backend.as_mut(), clipped);
    ctx.write_uniform(ctx.uniforms.camera, &scene.camera.reflected(height).uniform());
    ctx.write_uniform(ctx.uniforms.lights, &scene.light);
    ctx.write_uniform(ctx.uniforms.clip_plane, &ClipPlaneUniform {
        plane: [0.0, 1.0, 0.0, -height],
    });
    run_3d(ctx, None, |ctx| submit_entities(scene, ctx, opaque))?;

    // Below the surface
    bind_target(ctx, refraction, Some(scene.clear_colour), true);
    ctx.write_uniform(ctx.uniforms.camera, &scene.camera.uniform());
    ctx.write_uniform(ctx.uniforms.clip_plane, &ClipPlaneUniform {
        plane: [0.0, -1.0, 0.0, height],
    });
    run_3d(ctx, None, |ctx| submit_entities(scene, ctx, opaque))?;

    bind_target(ctx, resolved.target, None, false);
    ctx.state.apply(ctx.gpu.backend.as_mut(), GpuState::DEPTH_TEST | GpuState::CULL_FACE);
    let maps = [colour_of(ctx, reflection), colour_of(ctx, refraction)];
    for material in water_materials(scene) {
        bind_water_maps(ctx, material, &maps);
    }
    run_3d(ctx, None, |ctx| {
        submit_entities(scene, ctx, RendererKind::Renderer3D(MeshLayer::WaterSurface));
    })
}

fn water_materials(scene: &Scene) -> Vec<MaterialHandle> {
    let mut materials = Vec::new();
    for (entity, _) in scene.visible_entities() {
        for component in entity.components() {
            if let Component::Mesh(mesh) = component {
                if mesh.layer == MeshLayer::WaterSurface && !materials.contains(&mesh.material) {
                    materials.push(mesh.material);
                }
            }
        }
    }
    materials
}

/// Put the reflection and refraction maps in the first two sampler slots,
/// keeping any further textures (normal or distortion maps)
fn bind_water_maps(ctx: &mut RenderingContext, material: MaterialHandle, maps: &[TextureHandle; 2]) {
    let Some(material) = ctx.gpu.resources.material_mut(material) else {
        return;
    };
    let extra = material.textures.iter().skip(2).copied();
    material.textures = maps.iter().copied().chain(extra).collect();
}
