//! End-to-end pipeline scenarios on the recording backend

use hybrid_render::backend::{BufferKind, Capability, GpuCommand, TextureDesc};
use hybrid_render::passes::names::{FULLSCREEN_QUAD, HDR_FBO};
use hybrid_render::prelude::*;
use hybrid_render::render::{GpuContext, Renderer2D};
use hybrid_render::resources::{FramebufferHandle, MaterialHandle, ResourceManager};

const COPY_PROGRAM: &str = "copy";

fn system(config: RenderConfig) -> RenderSystem {
    let backend = RecordingBackend::new().with_passthrough_program(COPY_PROGRAM);
    RenderSystem::with_backend(config, Box::new(backend)).unwrap()
}

fn recording(system: &RenderSystem) -> &RecordingBackend {
    system.context().backend_as::<RecordingBackend>().unwrap()
}

/// Copy material plus the full-screen quad post passes draw with
fn install_copy_pass_resources(system: &mut RenderSystem, framebuffers: &[&str]) -> MaterialHandle {
    let ctx = system.context_mut();
    let backend = ctx.gpu.backend.as_mut();
    let resources = &mut ctx.gpu.resources;
    for name in framebuffers {
        resources.create_framebuffer(backend, name, FramebufferDesc::hdr(4, 4));
    }
    resources.add_geometry(FULLSCREEN_QUAD, Geometry::fullscreen_quad());
    let shader = resources.create_shader(backend, COPY_PROGRAM);
    resources.add_material(COPY_PROGRAM, Material::new(shader))
}

fn copy_pass(name: &str, source: &str, target: &str) -> RenderPass {
    RenderPass::new(name, PassKind::BloomExtract { threshold: 0.0 })
        .with_target(target)
        .reads(PassSource::colour(source))
        .with_material(COPY_PROGRAM)
}

fn colour_of(system: &RenderSystem, framebuffer: FramebufferHandle) -> Option<[f32; 4]> {
    let gpu = system.context().resources().framebuffer(framebuffer)?.gpu?;
    recording(system).framebuffer_colour(gpu, 0)
}

fn mesh_scene(system: &mut RenderSystem, count: usize) -> Scene {
    let ctx = system.context_mut();
    let backend = ctx.gpu.backend.as_mut();
    let resources = &mut ctx.gpu.resources;
    let shader = resources.create_shader(backend, "mesh");
    let material = resources.add_material("stone", Material::new(shader));

    let mut scene = Scene::new("meshes");
    for i in 0..count {
        let geometry = resources.add_geometry(format!("quad{i}"), Geometry::fullscreen_quad());
        scene.add_entity(
            Entity::new(format!("mesh{i}")).with_component(Component::Mesh(Mesh::new(geometry, material))),
        );
    }
    scene.add_pass(RenderPass::new("geometry", PassKind::Geometry));
    scene
}

#[test]
fn test_full_batch_flushes_before_accepting_more() {
    let config = RenderConfig::default().with_renderer_3d(BatchCapacity::new(2, 1000, 1000));
    let mut system = system(config);
    let mut scene = mesh_scene(&mut system, 3);

    system.on_render(&mut scene);

    let stats = system.context().renderer_3d.stats();
    assert_eq!(stats.flush_sizes, vec![2, 1]);
    assert_eq!(stats.submissions, 3);
    assert_eq!(stats.total_draws(), 3);
    assert_eq!(stats.geometry_uploads, 3);
}

#[test]
fn test_submit_before_initialise_is_rejected_without_gpu_commands() {
    let mut backend: Box<dyn GraphicsBackend> = Box::new(RecordingBackend::new());
    let resources = ResourceManager::new(backend.as_mut(), (8, 8));
    let mut gpu = GpuContext { backend, resources };
    let before = gpu.backend.as_any().downcast_ref::<RecordingBackend>().unwrap().commands().len();

    let mut renderer = Renderer2D::new(16);
    let result = renderer.submit(&mut gpu, &QuadData::new(1.0, 1.0), None, &Mat4::identity());

    assert_eq!(result, Err(RenderError::NotInitialised));
    let after = gpu.backend.as_any().downcast_ref::<RecordingBackend>().unwrap().commands().len();
    assert_eq!(before, after);
}

#[test]
fn test_geometry_is_uploaded_once_across_frames() {
    let mut system = system(RenderConfig::default());
    let mut scene = mesh_scene(&mut system, 4);

    for _ in 0..3 {
        system.on_render(&mut scene);
    }

    // Each distinct geometry once, none again on later frames
    assert_eq!(system.context().renderer_3d.stats().geometry_uploads, 4);
    assert_eq!(system.context().renderer_3d.stats().total_draws(), 4);
}

#[test]
fn test_textures_beyond_unit_budget_split_the_draw() {
    let mut system = system(RenderConfig::default().with_texture_units(2));
    let mut scene = Scene::new("textured");
    {
        let ctx = system.context_mut();
        let backend = ctx.gpu.backend.as_mut();
        let resources = &mut ctx.gpu.resources;
        let shader = resources.create_shader(backend, "mesh");
        let geometry = resources.add_geometry("quad", Geometry::fullscreen_quad());
        for i in 0..3u8 {
            let texture = resources.create_texture(
                backend,
                format!("albedo{i}"),
                TextureDesc::rgba8(1, 1),
                Some(&[i * 80, 0, 0, 255][..]),
            );
            let material = Material::new(shader).with_textures(vec![texture]);
            let material = resources.add_material(format!("m{i}"), material);
            let mesh = Component::Mesh(Mesh::new(geometry, material));
            scene.add_entity(Entity::new(format!("e{i}")).with_component(mesh));
        }
    }
    scene.add_pass(RenderPass::new("geometry", PassKind::Geometry));

    system.on_render(&mut scene);

    let stats = system.context().renderer_3d.stats();
    assert_eq!(stats.flush_sizes, vec![3]);
    assert_eq!(stats.multi_draw_calls, 2);

    let draws = recording(&system).draws();
    assert_eq!(draws.iter().map(|d| d.draws.len()).sum::<usize>(), 3);
    for draw in draws {
        assert!(draw.textures.iter().all(|(unit, _)| *unit < 2));
    }
}

#[test]
fn test_pass_chain_carries_colour_forward() {
    let mut system = system(RenderConfig::default().with_viewport(4, 4));
    install_copy_pass_resources(&mut system, &["a", "b"]);

    let colour = [0.25, 0.5, 0.75, 1.0];
    let mut scene = Scene::new("chain");
    scene.clear_colour = colour;
    scene.add_pass(RenderPass::new("A", PassKind::Geometry).with_target("a"));
    scene.add_pass(copy_pass("B", "A", "b"));

    system.on_render(&mut scene);

    let b = scene.render_pass_by_name("B").unwrap().frame_buffer().unwrap();
    assert_eq!(colour_of(&system, b), Some(colour));
}

#[test]
fn test_disabled_pass_keeps_last_frame_output() {
    let mut system = system(RenderConfig::default().with_viewport(4, 4));
    install_copy_pass_resources(&mut system, &["a", "b"]);

    let first = [1.0, 0.0, 0.0, 1.0];
    let mut scene = Scene::new("toggle");
    scene.clear_colour = first;
    scene.add_pass(RenderPass::new("A", PassKind::Geometry).with_target("a"));
    scene.add_pass(copy_pass("B", "A", "b"));
    system.on_render(&mut scene);

    assert!(scene.set_pass_enabled("A", false));
    scene.clear_colour = [0.0, 1.0, 0.0, 1.0];
    system.on_render(&mut scene);

    let a = scene.render_pass_by_name("A").unwrap().frame_buffer().unwrap();
    let b = scene.render_pass_by_name("B").unwrap().frame_buffer().unwrap();
    assert_eq!(colour_of(&system, a), Some(first));
    assert_eq!(colour_of(&system, b), Some(first));
}

#[test]
fn test_later_pass_samples_named_earlier_output() {
    let mut system = system(RenderConfig::default().with_viewport(4, 4));
    install_copy_pass_resources(&mut system, &[HDR_FBO, "out"]);

    let colour = [0.1, 0.2, 0.3, 1.0];
    let mut scene = Scene::new("fourth");
    scene.clear_colour = colour;
    scene.add_pass(RenderPass::new("first", PassKind::Geometry).with_target(HDR_FBO));
    scene.add_pass(RenderPass::new("second", PassKind::Ui));
    scene.add_pass(RenderPass::new("third", PassKind::Ui));
    scene.add_pass(copy_pass("fourth", "first", "out"));

    system.on_render(&mut scene);

    let resources = system.context().resources();
    let hdr = resources.find_framebuffer(HDR_FBO).unwrap();
    let fourth = scene.render_pass(3).unwrap();
    assert_eq!(
        fourth.source_texture(0),
        resources.attachment_texture(hdr, Attachment::Colour(0))
    );
    assert_eq!(colour_of(&system, fourth.frame_buffer().unwrap()), Some(colour));
}

#[test]
fn test_unknown_source_samples_default_colour() {
    let mut system = system(RenderConfig::default().with_viewport(4, 4));
    install_copy_pass_resources(&mut system, &["out"]);

    let mut scene = Scene::new("fallback");
    scene.add_pass(copy_pass("lonely", "nowhere", "out"));
    system.on_render(&mut scene);

    let out = scene.render_pass(0).unwrap().frame_buffer().unwrap();
    assert_eq!(colour_of(&system, out), Some([0.0, 0.0, 0.0, 1.0]));
}

#[test]
fn test_state_is_restored_between_passes() {
    let mut system = system(RenderConfig::default());
    let mut scene = mesh_scene(&mut system, 1);
    scene.add_pass(RenderPass::new("ui", PassKind::Ui));

    system.on_render(&mut scene);

    let backend = recording(&system);
    assert!(!backend.is_enabled(Capability::DepthTest));
    assert!(!backend.is_enabled(Capability::CullFace));
    assert!(!backend.is_enabled(Capability::Blend));
    let draw = &backend.draws()[0];
    assert!(draw.capabilities.contains(&Capability::DepthTest));
    assert!(!draw.capabilities.contains(&Capability::Blend));
}

#[test]
fn test_standard_pipeline_renders_a_full_frame() {
    let mut system = system(RenderConfig::default().with_viewport(16, 16));
    install_standard_resources(system.context_mut());
    let mut scene = mesh_scene(&mut system, 2);
    scene.remove_pass("geometry");
    for pass in StandardPipeline::default().with_water(0.0).passes() {
        scene.add_pass(pass);
    }

    system.on_render(&mut scene);

    let backend = recording(&system);
    // Geometry, reflection and refraction each draw the opaque meshes
    let mesh_draws = backend.draws().iter().filter(|d| d.draws.len() == 2).count();
    assert_eq!(mesh_draws, 3);
    assert!(backend.count(|c| matches!(c, GpuCommand::BindFramebuffer(None))) >= 2);
    assert_eq!(backend.invalid_writes(), 0);

    system.shutdown();
    let backend = recording(&system);
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_buffers(BufferKind::Instance), 0);
}
