//! # Renderer2D
//!
//! Batching renderer for alpha-blended quads and text.
//!
//! Blending makes draw order visible, so nothing is ever reordered: each
//! submission appends one indirect draw record, and anything that would
//! break the batch (a different shader, a full buffer, a texture that no
//! longer fits the unit pool) flushes what came before it first.
//! Vertices are transformed on the CPU so one batch can mix any number of
//! model matrices.

use bytemuck::{Pod, Zeroable};

use super::{
    report, FontAtlas, GlyphRun, GpuContext, RenderError, RenderResult, RendererState, RendererStats,
    SceneWideUniforms, StagingBuffer, TextureUnitManager,
};
use crate::backend::{BufferKind, DrawIndexedIndirect, GeometryBindings, GraphicsBackend};
use crate::config::BatchCapacity;
use crate::foundation::math::{modulate, transform_xy, Colour, Mat4, WHITE};
use crate::resources::{MaterialHandle, ResourceManager, ShaderHandle, TextureHandle, UvRect};

const NAME: &str = "Renderer2D";

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Vertex layout of the 2D batch
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex2D {
    /// Position after the model transform
    pub position: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Vertex colour
    pub colour: [f32; 4],
    /// Texture unit sampled by this vertex
    pub texture_unit: f32,
}

/// One textured, tinted quad centred on its model origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadData {
    /// Width and height in model units
    pub size: [f32; 2],
    /// Texture region
    pub uv: UvRect,
    /// Texture; `None` uses the material's first texture
    pub texture: Option<TextureHandle>,
    /// Colour multiplied with the material tint
    pub colour: Colour,
}

impl QuadData {
    /// Untextured white quad
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            size: [width, height],
            uv: UvRect::FULL,
            texture: None,
            colour: WHITE,
        }
    }

    /// Quad covering normalized device coordinates under an identity model
    pub fn fullscreen() -> Self {
        Self::new(2.0, 2.0)
    }

    /// Set texture
    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Set texture region
    pub fn with_uv(mut self, uv: UvRect) -> Self {
        self.uv = uv;
        self
    }

    /// Set colour
    pub fn with_colour(mut self, colour: Colour) -> Self {
        self.colour = colour;
        self
    }
}

fn quad_vertices(model: &Mat4, min: [f32; 2], max: [f32; 2], uv: UvRect, colour: Colour) -> [Vertex2D; 4] {
    let corner = |x: f32, y: f32, u: f32, v: f32| Vertex2D {
        position: transform_xy(model, x, y),
        uv: [u, v],
        colour,
        texture_unit: 0.0,
    };
    [
        corner(min[0], min[1], uv.min[0], uv.max[1]),
        corner(max[0], min[1], uv.max[0], uv.max[1]),
        corner(max[0], max[1], uv.max[0], uv.min[1]),
        corner(min[0], max[1], uv.min[0], uv.min[1]),
    ]
}

/// Batching quad and text renderer
#[derive(Debug)]
pub struct Renderer2D {
    state: RendererState,
    capacity: BatchCapacity,
    vertices: StagingBuffer<Vertex2D>,
    indices: StagingBuffer<u32>,
    indirect: StagingBuffer<DrawIndexedIndirect>,
    shader_override: Option<ShaderHandle>,
    current_shader: Option<ShaderHandle>,
    texture_units: TextureUnitManager,
    stats: RendererStats,
}

impl Renderer2D {
    /// Create an uninitialised renderer with a pool of `texture_units`
    pub fn new(texture_units: u32) -> Self {
        Self {
            state: RendererState::Uninitialised,
            capacity: BatchCapacity::new(0, 0, 0),
            vertices: StagingBuffer::new(BufferKind::Vertex, 0),
            indices: StagingBuffer::new(BufferKind::Index, 0),
            indirect: StagingBuffer::new(BufferKind::Indirect, 0),
            shader_override: None,
            current_shader: None,
            texture_units: TextureUnitManager::new(texture_units),
            stats: RendererStats::default(),
        }
    }

    /// Allocate staging arrays and GPU buffers. Valid exactly once; the
    /// capacities must hold at least one quad.
    pub fn initialise(&mut self, backend: &mut dyn GraphicsBackend, capacity: BatchCapacity) -> RenderResult<()> {
        match self.state {
            RendererState::Uninitialised => {}
            RendererState::Destroyed => return Err(report(NAME, RenderError::Destroyed)),
            RendererState::Initialised | RendererState::Recording => {
                return Err(report(NAME, RenderError::AlreadyInitialised))
            }
        }
        capacity
            .validate(4, 6)
            .map_err(|e| report(NAME, RenderError::InvalidCapacity(e)))?;

        self.capacity = capacity;
        self.vertices = StagingBuffer::new(BufferKind::Vertex, capacity.vertex_capacity);
        self.indices = StagingBuffer::new(BufferKind::Index, capacity.index_capacity);
        self.indirect = StagingBuffer::new(BufferKind::Indirect, capacity.batch_capacity);
        self.vertices.allocate(backend);
        self.indices.allocate(backend);
        self.indirect.allocate(backend);
        self.state = RendererState::Initialised;

        log::debug!(
            "{NAME} initialised: batch {}, vertices {}, indices {}",
            capacity.batch_capacity,
            capacity.vertex_capacity,
            capacity.index_capacity
        );
        Ok(())
    }

    /// Whether `initialise` has succeeded and `destroy` has not run
    pub fn is_initialised(&self) -> bool {
        matches!(self.state, RendererState::Initialised | RendererState::Recording)
    }

    /// Whether a begin/end cycle is open
    pub fn is_recording(&self) -> bool {
        self.state == RendererState::Recording
    }

    /// Counters
    pub fn stats(&self) -> &RendererStats {
        &self.stats
    }

    /// Clear the per-frame counters
    pub fn reset_frame_stats(&mut self) {
        self.stats.reset_frame();
    }

    /// Submissions waiting for the next flush
    pub fn pending(&self) -> usize {
        self.indirect.len()
    }

    /// Open a batch. `shader` overrides every material's shader.
    pub fn begin(
        &mut self,
        gpu: &mut GpuContext,
        shader: Option<ShaderHandle>,
        uniforms: &SceneWideUniforms,
    ) -> RenderResult<()> {
        self.state.require_idle(NAME)?;
        uniforms.bind(gpu.backend.as_mut(), &gpu.resources);
        self.shader_override = shader;
        self.current_shader = None;
        self.texture_units.reset();
        self.state = RendererState::Recording;
        Ok(())
    }

    fn resolve(
        &self,
        resources: &ResourceManager,
        material: Option<MaterialHandle>,
    ) -> RenderResult<(ShaderHandle, Colour, Option<TextureHandle>)> {
        match material {
            Some(handle) => {
                let material = resources
                    .material(handle)
                    .ok_or_else(|| report(NAME, RenderError::InvalidHandle("material")))?;
                let shader = self.shader_override.unwrap_or(material.shader);
                Ok((shader, material.tint, material.textures.first().copied()))
            }
            None => match self.shader_override {
                Some(shader) => Ok((shader, WHITE, None)),
                None => Err(report(NAME, RenderError::InvalidHandle("material"))),
            },
        }
    }

    /// Queue one quad
    pub fn submit(
        &mut self,
        gpu: &mut GpuContext,
        quad: &QuadData,
        material: Option<MaterialHandle>,
        model: &Mat4,
    ) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        let (shader, tint, material_texture) = self.resolve(&gpu.resources, material)?;
        let half = [quad.size[0] * 0.5, quad.size[1] * 0.5];
        let vertices = quad_vertices(model, [-half[0], -half[1]], half, quad.uv, modulate(quad.colour, tint));
        self.push_quads(gpu, shader, quad.texture.or(material_texture), &[vertices])
    }

    /// Queue a run of glyphs laid out from `font`. Runs longer than the
    /// buffers hold are split into consecutive draws.
    pub fn submit_text(
        &mut self,
        gpu: &mut GpuContext,
        run: &GlyphRun,
        font: &FontAtlas,
        material: Option<MaterialHandle>,
        model: &Mat4,
    ) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        let (shader, tint, _) = self.resolve(&gpu.resources, material)?;
        let colour = modulate(run.colour, tint);
        let width = run.size * font.advance;

        let quads: Vec<[Vertex2D; 4]> = font
            .layout(&run.text)
            .into_iter()
            .map(|(origin, uv)| {
                let min = [origin[0] * run.size, origin[1] * run.size];
                quad_vertices(model, min, [min[0] + width, min[1] + run.size], uv, colour)
            })
            .collect();

        let per_draw = (self.vertices.capacity() / 4).min(self.indices.capacity() / 6).max(1);
        for chunk in quads.chunks(per_draw) {
            self.push_quads(gpu, shader, Some(font.texture), chunk)?;
        }
        Ok(())
    }

    fn push_quads(
        &mut self,
        gpu: &mut GpuContext,
        shader: ShaderHandle,
        texture: Option<TextureHandle>,
        quads: &[[Vertex2D; 4]],
    ) -> RenderResult<()> {
        let vertex_count = quads.len() * 4;
        let index_count = quads.len() * 6;
        if vertex_count > self.vertices.capacity() || index_count > self.indices.capacity() {
            return Err(report(
                NAME,
                RenderError::GeometryTooLarge {
                    vertices: vertex_count,
                    indices: index_count,
                },
            ));
        }

        if self.current_shader.is_some_and(|current| current != shader) {
            self.flush(gpu)?;
        }

        let texture = gpu
            .resources
            .texture_gpu(texture.unwrap_or_else(|| gpu.resources.white_texture()));
        let full = self.indirect.remaining() == 0
            || self.vertices.remaining() < vertex_count
            || self.indices.remaining() < index_count;
        if full || !self.texture_units.fits(&[texture]) {
            self.flush(gpu)?;
        }

        self.current_shader = Some(shader);
        let unit = self.texture_units.acquire(gpu.backend.as_mut(), texture) as f32;
        let base_vertex = self.vertices.len();
        let first_index = self.indices.len();
        for (n, quad) in quads.iter().enumerate() {
            for vertex in quad {
                self.vertices.push(Vertex2D {
                    texture_unit: unit,
                    ..*vertex
                });
            }
            let base = (n * 4) as u32;
            for index in QUAD_INDICES {
                self.indices.push(base + index);
            }
        }
        self.indirect.push(DrawIndexedIndirect {
            index_count: index_count as u32,
            instance_count: 1,
            first_index: first_index as u32,
            base_vertex: base_vertex as i32,
            first_instance: 0,
        });
        self.stats.submissions += 1;
        Ok(())
    }

    /// Draw everything queued so far, in submission order
    pub fn flush(&mut self, gpu: &mut GpuContext) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        if self.indirect.is_empty() {
            return Ok(());
        }

        let backend = gpu.backend.as_mut();
        match self.current_shader.and_then(|shader| gpu.resources.shader(shader)) {
            Some(program) => backend.use_program(program.program),
            None => log::warn!("{NAME}: batch shader is no longer registered"),
        }
        self.vertices.upload(backend);
        self.indices.upload(backend);
        self.indirect.upload(backend);
        backend.bind_geometry(GeometryBindings {
            vertices: self.vertices.gpu(),
            indices: self.indices.gpu(),
            instances: None,
        });
        let draws = self.indirect.len();
        backend.multi_draw_indexed_indirect(self.indirect.gpu(), draws as u32);

        self.stats.flush_sizes.push(draws);
        self.stats.multi_draw_calls += 1;
        self.stats.texture_binds += self.texture_units.take_bind_count();
        self.vertices.clear();
        self.indices.clear();
        self.indirect.clear();
        self.texture_units.reset();
        log::trace!("{NAME}: flushed {draws} draws");
        Ok(())
    }

    /// Flush the partial batch and close the cycle
    pub fn end(&mut self, gpu: &mut GpuContext) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        self.flush(gpu)?;
        self.shader_override = None;
        self.current_shader = None;
        self.state = RendererState::Initialised;
        Ok(())
    }

    /// Release GPU buffers. Safe to call more than once.
    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.state == RendererState::Destroyed {
            return;
        }
        self.vertices.release(backend);
        self.indices.release(backend);
        self.indirect.release(backend);
        self.texture_units.reset();
        self.state = RendererState::Destroyed;
        log::debug!("{NAME} destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordingBackend, TextureDesc};
    use crate::resources::Material;

    struct Fixture {
        gpu: GpuContext,
        renderer: Renderer2D,
        sprite: MaterialHandle,
        uniforms: SceneWideUniforms,
    }

    fn fixture(capacity: BatchCapacity, units: u32) -> Fixture {
        let mut backend: Box<dyn GraphicsBackend> = Box::new(RecordingBackend::new());
        let mut resources = ResourceManager::new(backend.as_mut(), (8, 8));
        let shader = resources.create_shader(backend.as_mut(), "sprite");
        let sprite = resources.add_material("sprite", Material::new(shader));
        let mut renderer = Renderer2D::new(units);
        renderer.initialise(backend.as_mut(), capacity).unwrap();
        Fixture {
            gpu: GpuContext { backend, resources },
            renderer,
            sprite,
            uniforms: SceneWideUniforms::new(),
        }
    }

    fn recording(gpu: &GpuContext) -> &RecordingBackend {
        gpu.backend.as_any().downcast_ref().unwrap()
    }

    fn texture(gpu: &mut GpuContext, name: &str) -> TextureHandle {
        gpu.resources
            .create_texture(gpu.backend.as_mut(), name, TextureDesc::rgba8(1, 1), None)
    }

    #[test]
    fn test_submit_before_initialise_is_a_noop() {
        let mut backend: Box<dyn GraphicsBackend> = Box::new(RecordingBackend::new());
        let resources = ResourceManager::new(backend.as_mut(), (8, 8));
        let mut gpu = GpuContext { backend, resources };
        let before = recording(&gpu).commands().len();

        let mut renderer = Renderer2D::new(16);
        let result = renderer.submit(&mut gpu, &QuadData::new(1.0, 1.0), None, &Mat4::identity());
        assert_eq!(result, Err(RenderError::NotInitialised));
        assert_eq!(recording(&gpu).commands().len(), before);
    }

    #[test]
    fn test_shader_change_flushes_in_order() {
        let mut f = fixture(BatchCapacity::new(100, 400, 600), 16);
        let other = f.gpu.resources.create_shader(f.gpu.backend.as_mut(), "glyph");
        let glyph = f.gpu.resources.add_material("glyph", Material::new(other));
        let quad = QuadData::new(1.0, 1.0);

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        for material in [f.sprite, f.sprite, glyph, f.sprite] {
            f.renderer
                .submit(&mut f.gpu, &quad, Some(material), &Mat4::identity())
                .unwrap();
        }
        f.renderer.end(&mut f.gpu).unwrap();

        assert_eq!(f.renderer.stats().flush_sizes, vec![2, 1, 1]);
        let programs: Vec<_> = recording(&f.gpu).draws().iter().map(|d| d.program).collect();
        let sprite = recording(&f.gpu).program("sprite");
        let glyph = recording(&f.gpu).program("glyph");
        assert_eq!(programs, vec![sprite, glyph, sprite]);
    }

    #[test]
    fn test_capacity_overflow_flushes_without_dropping() {
        let mut f = fixture(BatchCapacity::new(3, 400, 600), 16);
        let quad = QuadData::new(1.0, 1.0);

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        for _ in 0..7 {
            f.renderer
                .submit(&mut f.gpu, &quad, Some(f.sprite), &Mat4::identity())
                .unwrap();
        }
        f.renderer.end(&mut f.gpu).unwrap();

        assert_eq!(f.renderer.stats().flush_sizes, vec![3, 3, 1]);
        assert_eq!(f.renderer.stats().submissions, 7);
    }

    #[test]
    fn test_texture_pool_exhaustion_flushes() {
        let mut f = fixture(BatchCapacity::new(100, 400, 600), 2);
        let textures: Vec<_> = (0..3).map(|n| texture(&mut f.gpu, &format!("t{n}"))).collect();

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        for texture in &textures {
            let quad = QuadData::new(1.0, 1.0).with_texture(*texture);
            f.renderer
                .submit(&mut f.gpu, &quad, Some(f.sprite), &Mat4::identity())
                .unwrap();
        }
        f.renderer.end(&mut f.gpu).unwrap();

        assert_eq!(f.renderer.stats().flush_sizes, vec![2, 1]);
        let last = recording(&f.gpu).draws().last().unwrap();
        assert_eq!(last.texture_at(0), Some(f.gpu.resources.texture_gpu(textures[2])));
    }

    #[test]
    fn test_untextured_quad_samples_white_not_previous_texture() {
        let mut f = fixture(BatchCapacity::new(100, 400, 600), 16);
        let logo = texture(&mut f.gpu, "logo");

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        let textured = QuadData::new(1.0, 1.0).with_texture(logo);
        f.renderer
            .submit(&mut f.gpu, &textured, Some(f.sprite), &Mat4::identity())
            .unwrap();
        f.renderer
            .submit(&mut f.gpu, &QuadData::new(1.0, 1.0), Some(f.sprite), &Mat4::identity())
            .unwrap();
        let logo_unit = f.renderer.vertices.as_slice()[0].texture_unit;
        let plain_unit = f.renderer.vertices.as_slice()[4].texture_unit;
        assert_ne!(logo_unit, plain_unit);
        f.renderer.end(&mut f.gpu).unwrap();

        assert_eq!(f.renderer.stats().flush_sizes, vec![2]);
        let draw = &recording(&f.gpu).draws()[0];
        let white = f.gpu.resources.texture_gpu(f.gpu.resources.white_texture());
        assert_eq!(draw.texture_at(plain_unit as u32), Some(white));
        assert_eq!(draw.texture_at(logo_unit as u32), Some(f.gpu.resources.texture_gpu(logo)));
    }

    #[test]
    fn test_vertices_are_transformed_on_cpu() {
        let mut f = fixture(BatchCapacity::new(100, 400, 600), 16);
        let model = Mat4::new_translation(&crate::foundation::math::Vec3::new(5.0, 0.0, 0.0));

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        f.renderer
            .submit(&mut f.gpu, &QuadData::new(2.0, 2.0), Some(f.sprite), &model)
            .unwrap();
        assert_eq!(f.renderer.vertices.as_slice()[0].position, [4.0, -1.0, 0.0]);
        assert_eq!(f.renderer.vertices.as_slice()[2].position, [6.0, 1.0, 0.0]);
        f.renderer.end(&mut f.gpu).unwrap();
    }

    #[test]
    fn test_long_text_is_split_across_draws() {
        // Room for two glyphs per draw
        let mut f = fixture(BatchCapacity::new(100, 8, 12), 16);
        let atlas_texture = texture(&mut f.gpu, "font");
        let font = FontAtlas::ascii(atlas_texture);

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        f.renderer
            .submit_text(&mut f.gpu, &GlyphRun::new("abcde", 1.0), &font, Some(f.sprite), &Mat4::identity())
            .unwrap();
        f.renderer.end(&mut f.gpu).unwrap();

        assert_eq!(f.renderer.stats().flush_sizes, vec![1, 1, 1]);
        let glyphs: u32 = recording(&f.gpu)
            .draws()
            .iter()
            .flat_map(|d| d.draws.iter())
            .map(|d| d.index_count / 6)
            .sum();
        assert_eq!(glyphs, 5);
    }

    #[test]
    fn test_quad_without_material_needs_override() {
        let mut f = fixture(BatchCapacity::new(100, 400, 600), 16);
        let quad = QuadData::fullscreen();

        f.renderer.begin(&mut f.gpu, None, &f.uniforms).unwrap();
        assert_eq!(
            f.renderer.submit(&mut f.gpu, &quad, None, &Mat4::identity()),
            Err(RenderError::InvalidHandle("material"))
        );
        f.renderer.end(&mut f.gpu).unwrap();

        let shader = f.gpu.resources.find_shader("sprite");
        f.renderer.begin(&mut f.gpu, shader, &f.uniforms).unwrap();
        assert!(f.renderer.submit(&mut f.gpu, &quad, None, &Mat4::identity()).is_ok());
        f.renderer.end(&mut f.gpu).unwrap();
        assert_eq!(f.renderer.stats().flush_sizes, vec![1]);
    }
}
