//! Backend that discards every command

use std::any::Any;

use super::{
    BufferKind, Capability, GeometryBindings, GpuBufferId, GpuFramebufferId, GpuProgramId, GpuTextureId,
    GraphicsBackend, TextureDesc,
};

/// Accepts all commands and does nothing.
///
/// Object creation still hands out distinct valid ids so higher layers keep
/// their bookkeeping consistent.
#[derive(Debug)]
pub struct NullBackend {
    next_id: u32,
}

impl NullBackend {
    /// Create a null backend
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn max_texture_units(&self) -> u32 {
        16
    }

    fn create_buffer(&mut self, _kind: BufferKind, _size: usize) -> GpuBufferId {
        GpuBufferId(self.allocate())
    }

    fn write_buffer(&mut self, _buffer: GpuBufferId, _offset: usize, _data: &[u8]) {}

    fn delete_buffer(&mut self, _buffer: GpuBufferId) {}

    fn create_texture(&mut self, _desc: &TextureDesc, _pixels: Option<&[u8]>) -> GpuTextureId {
        GpuTextureId(self.allocate())
    }

    fn write_texture(&mut self, _texture: GpuTextureId, _pixels: &[u8]) {}

    fn delete_texture(&mut self, _texture: GpuTextureId) {}

    fn create_framebuffer(&mut self, _colour: &[GpuTextureId], _depth: Option<GpuTextureId>) -> GpuFramebufferId {
        GpuFramebufferId(self.allocate())
    }

    fn delete_framebuffer(&mut self, _framebuffer: GpuFramebufferId) {}

    fn create_program(&mut self, _name: &str) -> GpuProgramId {
        GpuProgramId(self.allocate())
    }

    fn bind_framebuffer(&mut self, _framebuffer: Option<GpuFramebufferId>) {}

    fn set_viewport(&mut self, _width: u32, _height: u32) {}

    fn clear(&mut self, _colour: Option<[f32; 4]>, _depth: bool) {}

    fn set_capability(&mut self, _capability: Capability, _enabled: bool) {}

    fn use_program(&mut self, _program: GpuProgramId) {}

    fn bind_uniform_buffer(&mut self, _binding: u32, _buffer: GpuBufferId) {}

    fn bind_texture(&mut self, _unit: u32, _texture: GpuTextureId) {}

    fn bind_geometry(&mut self, _bindings: GeometryBindings) {}

    fn multi_draw_indexed_indirect(&mut self, _indirect: GpuBufferId, _draw_count: u32) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
