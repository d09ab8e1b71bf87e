//! # Renderer3D
//!
//! Batching renderer for depth-tested opaque meshes.
//!
//! Geometry is uploaded once into shared vertex/index buffers and stays
//! resident for the renderer's lifetime. Each submission becomes one
//! instance record plus one indirect draw record; a flush groups the batch
//! by shader (depth testing makes the draw order within a flush irrelevant)
//! and issues one indirect multi-draw per group, splitting a group only when
//! its textures exceed the texture-unit pool.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use super::{
    report, GpuContext, RenderError, RenderResult, RendererState, RendererStats, SceneWideUniforms, StagingBuffer,
    TextureUnitManager,
};
use crate::backend::{BufferKind, DrawIndexedIndirect, GeometryBindings, GpuTextureId, GraphicsBackend};
use crate::config::BatchCapacity;
use crate::foundation::math::{mat4_to_array, modulate, Colour, Mat4};
use crate::resources::{GeometryHandle, MaterialHandle, ResourceManager, ShaderHandle, TextureHandle, Vertex3D};

const NAME: &str = "Renderer3D";

/// Textures one mesh instance can sample
pub const MAX_MESH_TEXTURES: usize = 4;

/// Per-instance record read by the mesh shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshInstance {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// Material tint, already combined with the per-submission tint
    pub tint: [f32; 4],
    /// Texture unit of each material texture
    pub texture_units: [u32; 4],
    /// Specular exponent
    pub shininess: f32,
    _padding: [f32; 3],
}

impl MeshInstance {
    /// Pack one instance
    pub fn new(model: &Mat4, tint: Colour, texture_units: [u32; 4], shininess: f32) -> Self {
        Self {
            model: mat4_to_array(model),
            tint,
            texture_units,
            shininess,
            _padding: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResidentGeometry {
    first_index: u32,
    index_count: u32,
    base_vertex: i32,
}

#[derive(Debug, Clone)]
struct BatchEntry {
    geometry: GeometryHandle,
    material: MaterialHandle,
    model: Mat4,
    tint: Option<Colour>,
}

/// Batching mesh renderer
#[derive(Debug)]
pub struct Renderer3D {
    state: RendererState,
    capacity: BatchCapacity,
    vertices: StagingBuffer<Vertex3D>,
    indices: StagingBuffer<u32>,
    instances: StagingBuffer<MeshInstance>,
    indirect: StagingBuffer<DrawIndexedIndirect>,
    resident: HashMap<GeometryHandle, ResidentGeometry>,
    entries: Vec<BatchEntry>,
    shader_override: Option<ShaderHandle>,
    texture_units: TextureUnitManager,
    stats: RendererStats,
}

impl Renderer3D {
    /// Create an uninitialised renderer with a pool of `texture_units`
    pub fn new(texture_units: u32) -> Self {
        Self {
            state: RendererState::Uninitialised,
            capacity: BatchCapacity::new(0, 0, 0),
            vertices: StagingBuffer::new(BufferKind::Vertex, 0),
            indices: StagingBuffer::new(BufferKind::Index, 0),
            instances: StagingBuffer::new(BufferKind::Instance, 0),
            indirect: StagingBuffer::new(BufferKind::Indirect, 0),
            resident: HashMap::new(),
            entries: Vec::new(),
            shader_override: None,
            texture_units: TextureUnitManager::new(texture_units),
            stats: RendererStats::default(),
        }
    }

    /// Allocate staging arrays and GPU buffers. Valid exactly once.
    pub fn initialise(&mut self, backend: &mut dyn GraphicsBackend, capacity: BatchCapacity) -> RenderResult<()> {
        match self.state {
            RendererState::Uninitialised => {}
            RendererState::Destroyed => return Err(report(NAME, RenderError::Destroyed)),
            RendererState::Initialised | RendererState::Recording => {
                return Err(report(NAME, RenderError::AlreadyInitialised))
            }
        }
        capacity
            .validate(1, 1)
            .map_err(|e| report(NAME, RenderError::InvalidCapacity(e)))?;

        self.capacity = capacity;
        self.vertices = StagingBuffer::new(BufferKind::Vertex, capacity.vertex_capacity);
        self.indices = StagingBuffer::new(BufferKind::Index, capacity.index_capacity);
        self.instances = StagingBuffer::new(BufferKind::Instance, capacity.batch_capacity);
        self.indirect = StagingBuffer::new(BufferKind::Indirect, capacity.batch_capacity);
        self.vertices.allocate(backend);
        self.indices.allocate(backend);
        self.instances.allocate(backend);
        self.indirect.allocate(backend);
        self.entries = Vec::with_capacity(capacity.batch_capacity);
        self.state = RendererState::Initialised;

        log::debug!(
            "{NAME} initialised: batch {}, vertices {}, indices {}, texture units {}",
            capacity.batch_capacity,
            capacity.vertex_capacity,
            capacity.index_capacity,
            self.texture_units.capacity()
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

    /// Configured capacities
    pub fn capacity(&self) -> BatchCapacity {
        self.capacity
    }

    /// Counters
    pub fn stats(&self) -> &RendererStats {
        &self.stats
    }

    /// Clear the per-frame counters
    pub fn reset_frame_stats(&mut self) {
        self.stats.reset_frame();
    }

    /// Whether `geometry` already lives in the shared buffers
    pub fn is_resident(&self, geometry: GeometryHandle) -> bool {
        self.resident.contains_key(&geometry)
    }

    /// Submissions waiting for the next flush
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Open a batch. `shader` overrides every material's shader; `None`
    /// draws each submission with its own material's shader.
    pub fn begin(
        &mut self,
        gpu: &mut GpuContext,
        shader: Option<ShaderHandle>,
        uniforms: &SceneWideUniforms,
    ) -> RenderResult<()> {
        self.state.require_idle(NAME)?;
        uniforms.bind(gpu.backend.as_mut(), &gpu.resources);
        self.entries.clear();
        self.shader_override = shader;
        self.texture_units.reset();
        self.state = RendererState::Recording;
        Ok(())
    }

    /// Queue one mesh. Flushes first when the batch is full; the submission
    /// is never dropped for lack of space.
    pub fn submit(
        &mut self,
        gpu: &mut GpuContext,
        geometry: GeometryHandle,
        material: MaterialHandle,
        model: &Mat4,
        tint: Option<Colour>,
    ) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        if gpu.resources.material(material).is_none() {
            return Err(report(NAME, RenderError::InvalidHandle("material")));
        }

        if self.entries.len() >= self.capacity.batch_capacity {
            self.flush(gpu)?;
        }
        self.ensure_resident(gpu, geometry)?;

        self.entries.push(BatchEntry {
            geometry,
            material,
            model: *model,
            tint,
        });
        self.stats.submissions += 1;
        Ok(())
    }

    fn ensure_resident(&mut self, gpu: &mut GpuContext, geometry: GeometryHandle) -> RenderResult<()> {
        if self.resident.contains_key(&geometry) {
            return Ok(());
        }

        let (vertex_count, index_count) = match gpu.resources.geometry(geometry) {
            Some(data) => (data.vertices().len(), data.indices().len()),
            None => return Err(report(NAME, RenderError::InvalidHandle("geometry"))),
        };
        let too_large = RenderError::GeometryTooLarge {
            vertices: vertex_count,
            indices: index_count,
        };
        if vertex_count > self.vertices.capacity() || index_count > self.indices.capacity() {
            return Err(report(NAME, too_large));
        }

        if vertex_count > self.vertices.remaining() || index_count > self.indices.remaining() {
            log::warn!("{NAME}: shared geometry buffers are full, recycling them");
            self.flush(gpu)?;
            self.vertices.clear();
            self.indices.clear();
            self.resident.clear();
        }

        let Some(data) = gpu.resources.geometry(geometry) else {
            return Err(report(NAME, RenderError::InvalidHandle("geometry")));
        };
        let base_vertex = self.vertices.extend(data.vertices());
        let first_index = self.indices.extend(data.indices());
        let (Some(base_vertex), Some(first_index)) = (base_vertex, first_index) else {
            return Err(report(NAME, too_large));
        };

        let backend = gpu.backend.as_mut();
        self.vertices.upload_range(backend, base_vertex, base_vertex + vertex_count);
        self.indices.upload_range(backend, first_index, first_index + index_count);
        self.resident.insert(
            geometry,
            ResidentGeometry {
                first_index: first_index as u32,
                index_count: index_count as u32,
                base_vertex: base_vertex as i32,
            },
        );
        self.stats.geometry_uploads += 1;
        log::trace!("{NAME}: uploaded geometry ({vertex_count} vertices, {index_count} indices)");
        Ok(())
    }

    /// Draw everything queued so far
    pub fn flush(&mut self, gpu: &mut GpuContext) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        if self.entries.is_empty() {
            return Ok(());
        }

        let entries = std::mem::take(&mut self.entries);
        let backend = gpu.backend.as_mut();
        let resources = &gpu.resources;

        // Shader groups in order of first appearance
        let mut groups: Vec<(ShaderHandle, Vec<&BatchEntry>)> = Vec::new();
        for entry in &entries {
            let Some(material) = resources.material(entry.material) else {
                log::warn!("{NAME}: material removed before flush, skipping draw");
                continue;
            };
            let shader = self.shader_override.unwrap_or(material.shader);
            match groups.iter_mut().find(|(s, _)| *s == shader) {
                Some((_, group)) => group.push(entry),
                None => groups.push((shader, vec![entry])),
            }
        }

        backend.bind_geometry(GeometryBindings {
            vertices: self.vertices.gpu(),
            indices: self.indices.gpu(),
            instances: Some(self.instances.gpu()),
        });
        self.instances.clear();
        self.texture_units.reset();

        // One instance must never evict its own textures
        let texture_limit = MAX_MESH_TEXTURES.min(self.texture_units.capacity() as usize);
        let mut drawn = 0;
        for (shader, group) in groups {
            let Some(program) = resources.shader(shader) else {
                log::warn!("{NAME}: shader removed before flush, skipping {} draws", group.len());
                continue;
            };
            backend.use_program(program.program);
            self.indirect.clear();

            let mut range_start = self.instances.len();
            for entry in group {
                let (Some(material), Some(resident)) =
                    (resources.material(entry.material), self.resident.get(&entry.geometry).copied())
                else {
                    continue;
                };
                let textures = instance_textures(resources, &material.textures, texture_limit);

                if !self.texture_units.fits(&textures) {
                    self.draw(backend, range_start);
                    self.texture_units.reset();
                    range_start = self.instances.len();
                }

                let mut units = [0u32; MAX_MESH_TEXTURES];
                for (unit, texture) in units.iter_mut().zip(&textures) {
                    *unit = self.texture_units.acquire(backend, *texture);
                }

                let tint = entry.tint.map_or(material.tint, |tint| modulate(material.tint, tint));
                let first_instance = self.instances.len() as u32;
                self.instances
                    .push(MeshInstance::new(&entry.model, tint, units, material.shininess));
                self.indirect.push(DrawIndexedIndirect {
                    index_count: resident.index_count,
                    instance_count: 1,
                    first_index: resident.first_index,
                    base_vertex: resident.base_vertex,
                    first_instance,
                });
                drawn += 1;
            }
            self.draw(backend, range_start);
        }

        self.stats.flush_sizes.push(drawn);
        self.stats.texture_binds += self.texture_units.take_bind_count();
        self.texture_units.reset();
        log::trace!("{NAME}: flushed {drawn} draws");
        Ok(())
    }

    fn draw(&mut self, backend: &mut dyn GraphicsBackend, instance_start: usize) {
        if self.indirect.is_empty() {
            return;
        }
        self.instances.upload_range(backend, instance_start, self.instances.len());
        self.indirect.upload(backend);
        backend.multi_draw_indexed_indirect(self.indirect.gpu(), self.indirect.len() as u32);
        self.indirect.clear();
        self.stats.multi_draw_calls += 1;
    }

    /// Flush the partial batch and close the cycle
    pub fn end(&mut self, gpu: &mut GpuContext) -> RenderResult<()> {
        self.state.require_recording(NAME)?;
        self.flush(gpu)?;
        self.shader_override = None;
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
        self.instances.release(backend);
        self.indirect.release(backend);
        self.resident.clear();
        self.entries.clear();
        self.texture_units.reset();
        self.state = RendererState::Destroyed;
        log::debug!("{NAME} destroyed");
    }
}

/// Backend textures one instance samples: the material's, capped at
/// `limit`, or the white texture when it has none
fn instance_textures(resources: &ResourceManager, textures: &[TextureHandle], limit: usize) -> Vec<GpuTextureId> {
    if textures.is_empty() {
        return vec![resources.texture_gpu(resources.white_texture())];
    }
    if textures.len() > limit {
        log::warn!(
            "{NAME}: material samples {} textures but only {limit} units are available, dropping the rest",
            textures.len()
        );
    }
    textures
        .iter()
        .take(limit)
        .map(|texture| resources.texture_gpu(*texture))
        .collect()
}
