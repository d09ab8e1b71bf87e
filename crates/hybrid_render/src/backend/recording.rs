//! GPU-less backend that records every command
//!
//! Besides the raw command log, the recorder keeps a tiny simulation of
//! texture contents: every texture holds a single representative colour.
//! Clearing a framebuffer writes the clear colour into its colour
//! attachments, and a draw with a *passthrough* program copies whatever is
//! bound to texture unit 0 into colour attachment 0 of the bound target.
//! That is enough to follow data from one pass's output into a later pass.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{
    BufferKind, Capability, DrawIndexedIndirect, GeometryBindings, GpuBufferId, GpuFramebufferId, GpuProgramId,
    GpuTextureId, GraphicsBackend, TextureDesc,
};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Buffer allocation
    CreateBuffer {
        /// New id
        buffer: GpuBufferId,
        /// Usage
        kind: BufferKind,
        /// Size in bytes
        size: usize,
    },
    /// Buffer upload
    WriteBuffer {
        /// Destination
        buffer: GpuBufferId,
        /// Byte offset
        offset: usize,
        /// Byte length
        len: usize,
    },
    /// Buffer release
    DeleteBuffer(GpuBufferId),
    /// Texture allocation
    CreateTexture(GpuTextureId),
    /// Texture upload
    WriteTexture(GpuTextureId),
    /// Texture release
    DeleteTexture(GpuTextureId),
    /// Framebuffer creation
    CreateFramebuffer(GpuFramebufferId),
    /// Framebuffer release
    DeleteFramebuffer(GpuFramebufferId),
    /// Program creation
    CreateProgram(GpuProgramId),
    /// Render target switch
    BindFramebuffer(Option<GpuFramebufferId>),
    /// Viewport change
    Viewport(u32, u32),
    /// Clear
    Clear {
        /// Colour written to colour attachments, if any
        colour: Option<[f32; 4]>,
        /// Whether depth was cleared
        depth: bool,
    },
    /// Capability toggle
    SetCapability(Capability, bool),
    /// Program switch
    UseProgram(GpuProgramId),
    /// Uniform buffer binding
    BindUniformBuffer {
        /// Binding point
        binding: u32,
        /// Buffer
        buffer: GpuBufferId,
    },
    /// Texture unit binding
    BindTexture {
        /// Unit
        unit: u32,
        /// Texture
        texture: GpuTextureId,
    },
    /// Geometry buffer binding
    BindGeometry(GeometryBindings),
    /// Indirect multi-draw
    MultiDrawIndexedIndirect {
        /// Parameter buffer
        indirect: GpuBufferId,
        /// Number of draws
        draw_count: u32,
    },
}

/// Snapshot of the device state at one indirect multi-draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Bound render target (`None` is the default framebuffer)
    pub target: Option<GpuFramebufferId>,
    /// Current program
    pub program: Option<GpuProgramId>,
    /// Draw parameters decoded from the indirect buffer
    pub draws: Vec<DrawIndexedIndirect>,
    /// Texture bound to each unit, ordered by unit
    pub textures: Vec<(u32, GpuTextureId)>,
    /// Uniform buffer bound to each binding point, ordered by binding
    pub uniforms: Vec<(u32, GpuBufferId)>,
    /// Capabilities enabled at draw time
    pub capabilities: HashSet<Capability>,
}

impl DrawRecord {
    /// Texture bound to `unit` when the draw was issued
    pub fn texture_at(&self, unit: u32) -> Option<GpuTextureId> {
        self.textures.iter().find(|(u, _)| *u == unit).map(|(_, t)| *t)
    }
}

#[derive(Debug)]
struct BufferRecord {
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct FramebufferRecord {
    colour: Vec<GpuTextureId>,
    depth: Option<GpuTextureId>,
}

/// Command recorder implementing [`GraphicsBackend`]
#[derive(Debug)]
pub struct RecordingBackend {
    next_id: u32,
    texture_units: u32,
    commands: Vec<GpuCommand>,
    draws: Vec<DrawRecord>,
    buffers: HashMap<GpuBufferId, BufferRecord>,
    textures: HashMap<GpuTextureId, [f32; 4]>,
    framebuffers: HashMap<GpuFramebufferId, FramebufferRecord>,
    programs: HashMap<String, GpuProgramId>,
    passthrough_names: HashSet<String>,
    passthrough_programs: HashSet<GpuProgramId>,
    screen: [f32; 4],
    bound_framebuffer: Option<GpuFramebufferId>,
    bound_program: Option<GpuProgramId>,
    bound_textures: BTreeMap<u32, GpuTextureId>,
    bound_uniforms: BTreeMap<u32, GpuBufferId>,
    enabled: HashSet<Capability>,
    invalid_writes: usize,
}

impl RecordingBackend {
    /// Create a recorder exposing 16 texture units
    pub fn new() -> Self {
        Self::with_texture_units(16)
    }

    /// Create a recorder exposing `units` texture units
    pub fn with_texture_units(units: u32) -> Self {
        Self {
            next_id: 1,
            texture_units: units,
            commands: Vec::new(),
            draws: Vec::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            passthrough_names: HashSet::new(),
            passthrough_programs: HashSet::new(),
            screen: [0.0; 4],
            bound_framebuffer: None,
            bound_program: None,
            bound_textures: BTreeMap::new(),
            bound_uniforms: BTreeMap::new(),
            enabled: HashSet::new(),
            invalid_writes: 0,
        }
    }

    /// Treat programs created under `name` as copying unit 0 into the target
    pub fn with_passthrough_program(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if let Some(id) = self.programs.get(&name) {
            self.passthrough_programs.insert(*id);
        }
        self.passthrough_names.insert(name);
        self
    }

    /// Every command recorded so far
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Every indirect multi-draw recorded so far
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Forget recorded commands and draws; simulated contents are kept
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Simulated colour of a texture
    pub fn texel(&self, texture: GpuTextureId) -> Option<[f32; 4]> {
        self.textures.get(&texture).copied()
    }

    /// Simulated colour of a framebuffer's colour attachment
    pub fn framebuffer_colour(&self, framebuffer: GpuFramebufferId, attachment: usize) -> Option<[f32; 4]> {
        let record = self.framebuffers.get(&framebuffer)?;
        self.texel(*record.colour.get(attachment)?)
    }

    /// Simulated colour of the default framebuffer
    pub fn screen_colour(&self) -> [f32; 4] {
        self.screen
    }

    /// Contents of a live buffer
    pub fn buffer_data(&self, buffer: GpuBufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    /// Number of live buffers of a kind
    pub fn live_buffers(&self, kind: BufferKind) -> usize {
        self.buffers.values().filter(|b| b.kind == kind).count()
    }

    /// Number of live textures
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Whether a capability is currently enabled
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    /// Currently bound render target
    pub fn bound_framebuffer(&self) -> Option<GpuFramebufferId> {
        self.bound_framebuffer
    }

    /// Program created under `name`
    pub fn program(&self, name: &str) -> Option<GpuProgramId> {
        self.programs.get(name).copied()
    }

    /// Buffer writes that fell outside the buffer and were dropped
    pub fn invalid_writes(&self) -> usize {
        self.invalid_writes
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn texel_from_bytes(pixels: Option<&[u8]>) -> [f32; 4] {
        match pixels {
            Some([r, g, b, a, ..]) => [
                f32::from(*r) / 255.0,
                f32::from(*g) / 255.0,
                f32::from(*b) / 255.0,
                f32::from(*a) / 255.0,
            ],
            _ => [0.0; 4],
        }
    }

    fn write_target_colour(&mut self, colour: [f32; 4], only_first: bool) {
        match self.bound_framebuffer {
            None => self.screen = colour,
            Some(framebuffer) => {
                let Some(record) = self.framebuffers.get(&framebuffer) else {
                    log::error!("Recording backend: framebuffer {framebuffer:?} is not live");
                    return;
                };
                let count = if only_first { 1 } else { record.colour.len() };
                for texture in record.colour.iter().take(count) {
                    self.textures.insert(*texture, colour);
                }
            }
        }
    }

    fn decode_indirect(&self, indirect: GpuBufferId, draw_count: u32) -> Vec<DrawIndexedIndirect> {
        let Some(buffer) = self.buffers.get(&indirect) else {
            log::error!("Recording backend: indirect buffer {indirect:?} is not live");
            return Vec::new();
        };
        let stride = std::mem::size_of::<DrawIndexedIndirect>();
        buffer
            .data
            .chunks_exact(stride)
            .take(draw_count as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn max_texture_units(&self) -> u32 {
        self.texture_units
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> GpuBufferId {
        let buffer = GpuBufferId(self.allocate());
        self.buffers.insert(buffer, BufferRecord { kind, data: vec![0; size] });
        self.commands.push(GpuCommand::CreateBuffer { buffer, kind, size });
        buffer
    }

    fn write_buffer(&mut self, buffer: GpuBufferId, offset: usize, data: &[u8]) {
        self.commands.push(GpuCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        let Some(record) = self.buffers.get_mut(&buffer) else {
            log::error!("Recording backend: write to dead buffer {buffer:?}");
            self.invalid_writes += 1;
            return;
        };
        let end = offset + data.len();
        if end > record.data.len() {
            log::error!(
                "Recording backend: write of {} bytes at {offset} overruns buffer {buffer:?} ({} bytes)",
                data.len(),
                record.data.len()
            );
            self.invalid_writes += 1;
            return;
        }
        record.data[offset..end].copy_from_slice(data);
    }

    fn delete_buffer(&mut self, buffer: GpuBufferId) {
        self.buffers.remove(&buffer);
        self.commands.push(GpuCommand::DeleteBuffer(buffer));
    }

    fn create_texture(&mut self, _desc: &TextureDesc, pixels: Option<&[u8]>) -> GpuTextureId {
        let texture = GpuTextureId(self.allocate());
        self.textures.insert(texture, Self::texel_from_bytes(pixels));
        self.commands.push(GpuCommand::CreateTexture(texture));
        texture
    }

    fn write_texture(&mut self, texture: GpuTextureId, pixels: &[u8]) {
        self.commands.push(GpuCommand::WriteTexture(texture));
        if let Some(texel) = self.textures.get_mut(&texture) {
            *texel = Self::texel_from_bytes(Some(pixels));
        }
    }

    fn delete_texture(&mut self, texture: GpuTextureId) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, t| *t != texture);
        self.commands.push(GpuCommand::DeleteTexture(texture));
    }

    fn create_framebuffer(&mut self, colour: &[GpuTextureId], depth: Option<GpuTextureId>) -> GpuFramebufferId {
        let framebuffer = GpuFramebufferId(self.allocate());
        self.framebuffers.insert(
            framebuffer,
            FramebufferRecord {
                colour: colour.to_vec(),
                depth,
            },
        );
        self.commands.push(GpuCommand::CreateFramebuffer(framebuffer));
        framebuffer
    }

    fn delete_framebuffer(&mut self, framebuffer: GpuFramebufferId) {
        if let Some(record) = self.framebuffers.remove(&framebuffer) {
            log::trace!(
                "Recording backend: released framebuffer {framebuffer:?} ({} colour, depth: {})",
                record.colour.len(),
                record.depth.is_some()
            );
        }
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        self.commands.push(GpuCommand::DeleteFramebuffer(framebuffer));
    }

    fn create_program(&mut self, name: &str) -> GpuProgramId {
        if let Some(program) = self.programs.get(name) {
            return *program;
        }
        let program = GpuProgramId(self.allocate());
        self.programs.insert(name.to_string(), program);
        if self.passthrough_names.contains(name) {
            self.passthrough_programs.insert(program);
        }
        self.commands.push(GpuCommand::CreateProgram(program));
        program
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebufferId>) {
        self.bound_framebuffer = framebuffer;
        self.commands.push(GpuCommand::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(GpuCommand::Viewport(width, height));
    }

    fn clear(&mut self, colour: Option<[f32; 4]>, depth: bool) {
        if let Some(colour) = colour {
            self.write_target_colour(colour, false);
        }
        self.commands.push(GpuCommand::Clear { colour, depth });
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.enabled.insert(capability);
        } else {
            self.enabled.remove(&capability);
        }
        self.commands.push(GpuCommand::SetCapability(capability, enabled));
    }

    fn use_program(&mut self, program: GpuProgramId) {
        self.bound_program = Some(program);
        self.commands.push(GpuCommand::UseProgram(program));
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: GpuBufferId) {
        self.bound_uniforms.insert(binding, buffer);
        self.commands.push(GpuCommand::BindUniformBuffer { binding, buffer });
    }

    fn bind_texture(&mut self, unit: u32, texture: GpuTextureId) {
        if unit >= self.texture_units {
            log::error!("Recording backend: texture unit {unit} out of range ({})", self.texture_units);
        }
        self.bound_textures.insert(unit, texture);
        self.commands.push(GpuCommand::BindTexture { unit, texture });
    }

    fn bind_geometry(&mut self, bindings: GeometryBindings) {
        self.commands.push(GpuCommand::BindGeometry(bindings));
    }

    fn multi_draw_indexed_indirect(&mut self, indirect: GpuBufferId, draw_count: u32) {
        self.commands.push(GpuCommand::MultiDrawIndexedIndirect { indirect, draw_count });
        let draws = self.decode_indirect(indirect, draw_count);
        self.draws.push(DrawRecord {
            target: self.bound_framebuffer,
            program: self.bound_program,
            draws,
            textures: self.bound_textures.iter().map(|(u, t)| (*u, *t)).collect(),
            uniforms: self.bound_uniforms.iter().map(|(b, u)| (*b, *u)).collect(),
            capabilities: self.enabled.clone(),
        });

        let passthrough = self
            .bound_program
            .is_some_and(|program| self.passthrough_programs.contains(&program));
        if passthrough {
            if let Some(source) = self.bound_textures.get(&0).and_then(|t| self.textures.get(t)).copied() {
                self.write_target_colour(source, true);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
