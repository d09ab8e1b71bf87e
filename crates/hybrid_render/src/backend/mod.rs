//! Backend abstraction for the rendering system
//!
//! The pipeline talks to the GPU exclusively through [`GraphicsBackend`], a
//! small set of abstract resource, state and draw commands. Exactly one
//! backend is active per [`RenderingContext`](crate::RenderingContext).
//!
//! ## Implementations
//!
//! - [`RecordingBackend`]: GPU-less backend that records every command and
//!   simulates attachment contents. Used by tests and headless tools.
//! - [`NullBackend`]: accepts every command and does nothing. The default
//!   backend, and the stand-in when the configured backend is not available
//!   in this build.

mod null;
mod recording;

pub use null::NullBackend;
pub use recording::{DrawRecord, GpuCommand, RecordingBackend};

use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::render::{RenderError, RenderResult};

macro_rules! gpu_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// The id no live object ever has
            pub const INVALID: Self = Self(0);

            /// Whether this id can refer to a live object
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }
    };
}

gpu_id!(
    /// Backend buffer object
    GpuBufferId
);
gpu_id!(
    /// Backend texture object
    GpuTextureId
);
gpu_id!(
    /// Backend framebuffer object. The default (screen) framebuffer has no id
    /// and is addressed as `None` in [`GraphicsBackend::bind_framebuffer`].
    GpuFramebufferId
);
gpu_id!(
    /// Backend shader program
    GpuProgramId
);

/// Graphics backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// In-process command recorder, no GPU required
    Recording,
    /// Discards every command
    Null,
    /// Vulkan (not compiled into this crate)
    Vulkan,
    /// OpenGL 4.3+ (not compiled into this crate)
    OpenGl,
}

/// Intended use of a buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attributes
    Vertex,
    /// 32-bit indices
    Index,
    /// Per-instance attributes
    Instance,
    /// Indirect draw parameters
    Indirect,
    /// Shader-visible constants
    Uniform,
}

/// Fixed-function state the pipeline toggles between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Depth testing and depth writes
    DepthTest,
    /// Alpha blending (source-alpha, one-minus-source-alpha)
    Blend,
    /// Back-face culling
    CullFace,
    /// User clip distance 0
    ClipDistance0,
    /// Line polygon mode
    Wireframe,
}

/// Texel format of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA
    Rgba8,
    /// Half-float RGBA, used for HDR targets
    Rgba16F,
    /// 24-bit depth
    Depth24,
}

/// Texture creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
}

impl TextureDesc {
    /// RGBA8 texture of the given size
    pub const fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8,
        }
    }
}

/// One record of an indirect draw buffer, laid out as the device reads it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawIndexedIndirect {
    /// Indices to draw
    pub index_count: u32,
    /// Instances to draw
    pub instance_count: u32,
    /// First index within the bound index buffer
    pub first_index: u32,
    /// Value added to each index before fetching vertices
    pub base_vertex: i32,
    /// First instance within the bound instance buffer
    pub first_instance: u32,
}

/// Buffers sourced by the next draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBindings {
    /// Vertex attribute buffer
    pub vertices: GpuBufferId,
    /// Index buffer
    pub indices: GpuBufferId,
    /// Optional per-instance attribute buffer
    pub instances: Option<GpuBufferId>,
}

/// Abstract draw/state command sink implemented by every graphics backend.
///
/// Commands are infallible from the caller's point of view: a backend that
/// hits a device error logs it and aborts the process, there is no partial
/// frame rollback.
pub trait GraphicsBackend {
    /// Human readable backend name
    fn name(&self) -> &'static str;

    /// Number of texture units the device exposes to one draw
    fn max_texture_units(&self) -> u32;

    /// Allocate a buffer of `size` bytes
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> GpuBufferId;

    /// Write `data` into a buffer at a byte offset
    fn write_buffer(&mut self, buffer: GpuBufferId, offset: usize, data: &[u8]);

    /// Release a buffer
    fn delete_buffer(&mut self, buffer: GpuBufferId);

    /// Allocate a texture, optionally with initial RGBA8 texel data
    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> GpuTextureId;

    /// Replace a texture's texel data
    fn write_texture(&mut self, texture: GpuTextureId, pixels: &[u8]);

    /// Release a texture
    fn delete_texture(&mut self, texture: GpuTextureId);

    /// Create a framebuffer from colour attachments and an optional depth attachment
    fn create_framebuffer(&mut self, colour: &[GpuTextureId], depth: Option<GpuTextureId>) -> GpuFramebufferId;

    /// Release a framebuffer (its attachments are released separately)
    fn delete_framebuffer(&mut self, framebuffer: GpuFramebufferId);

    /// Compile/link (or look up) the named shader program
    fn create_program(&mut self, name: &str) -> GpuProgramId;

    /// Bind a render target; `None` is the default framebuffer
    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebufferId>);

    /// Set the viewport rectangle starting at the origin
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear colour attachments (when `colour` is given) and/or depth
    fn clear(&mut self, colour: Option<[f32; 4]>, depth: bool);

    /// Enable or disable a fixed-function capability
    fn set_capability(&mut self, capability: Capability, enabled: bool);

    /// Make a program current
    fn use_program(&mut self, program: GpuProgramId);

    /// Bind a uniform buffer to a binding point
    fn bind_uniform_buffer(&mut self, binding: u32, buffer: GpuBufferId);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: GpuTextureId);

    /// Bind vertex/index/instance buffers for subsequent draws
    fn bind_geometry(&mut self, bindings: GeometryBindings);

    /// Issue `draw_count` indexed draws whose parameters are read from `indirect`
    fn multi_draw_indexed_indirect(&mut self, indirect: GpuBufferId, draw_count: u32);

    /// Downcast support for tests and tools that need the concrete backend
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Create the backend selected by `kind`.
///
/// Only in-process backends are compiled into this crate; selecting a device
/// backend logs an error and yields a [`NullBackend`] so the frame loop keeps
/// running.
pub fn create_backend(kind: BackendKind) -> Box<dyn GraphicsBackend> {
    try_create_backend(kind).unwrap_or_else(|err| {
        log::error!("{err}, falling back to the null backend");
        Box::new(NullBackend::new())
    })
}

/// Create the backend selected by `kind`, failing for backends not compiled
/// into this crate
pub fn try_create_backend(kind: BackendKind) -> RenderResult<Box<dyn GraphicsBackend>> {
    match kind {
        BackendKind::Recording => Ok(Box::new(RecordingBackend::new())),
        BackendKind::Null => Ok(Box::new(NullBackend::new())),
        BackendKind::Vulkan | BackendKind::OpenGl => Err(RenderError::UnsupportedBackend(format!("{kind:?}"))),
    }
}
