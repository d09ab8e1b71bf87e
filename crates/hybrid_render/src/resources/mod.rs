//! # Resource Layer
//!
//! Single owner of every GPU-backed resource the pipeline touches: geometry,
//! materials, shader programs, textures and sub-textures, framebuffers and
//! uniform buffers.
//!
//! Everything else holds non-owning generational handles. A handle to a
//! removed resource simply stops resolving; a handle to a texture that is
//! still loading resolves to a pending entry without a GPU object.
//!
//! Name lookups (`find_*`) follow the pipeline's error policy: a missing name
//! is logged as an error and the caller receives `None` and must degrade.

mod framebuffer;
mod geometry;
mod loader;
mod material;
mod texture;

pub use framebuffer::{Attachment, FrameBuffer};
pub use geometry::{Geometry, Vertex3D};
pub use loader::{LoadedResource, ResourceInbox, ResourceSender};
pub use material::Material;
pub use texture::{ShaderProgram, SubTexture, Texture, UvRect};

use crate::backend::{BufferKind, GpuBufferId, GpuTextureId, GraphicsBackend, TextureDesc, TextureFormat};
use crate::foundation::collections::NamedArena;
use crate::render::{RenderError, RenderResult};

slotmap::new_key_type! {
    /// Handle to registered [`Geometry`]
    pub struct GeometryHandle;
    /// Handle to a [`Material`]
    pub struct MaterialHandle;
    /// Handle to a [`ShaderProgram`]
    pub struct ShaderHandle;
    /// Handle to a [`Texture`]
    pub struct TextureHandle;
    /// Handle to a [`SubTexture`]
    pub struct SubTextureHandle;
    /// Handle to a [`FrameBuffer`]
    pub struct FramebufferHandle;
    /// Handle to a [`UniformBuffer`]
    pub struct UniformBufferHandle;
}

/// Name of the well-known default framebuffer
pub const DEFAULT_FRAMEBUFFER: &str = "default";

/// Name of the 1x1 black texture standing in for the default framebuffer's colour
pub const FALLBACK_TEXTURE: &str = "fallback";

/// Name of the 1x1 white texture bound for untextured draws
pub const WHITE_TEXTURE: &str = "white";

/// Shader-visible constant buffer bound at a fixed binding point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBuffer {
    /// Binding point
    pub binding: u32,
    /// Size in bytes
    pub size: usize,
    /// Backend buffer
    pub gpu: GpuBufferId,
}

/// Parameters of an off-screen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of colour attachments
    pub colour_attachments: u8,
    /// Format of the colour attachments
    pub format: TextureFormat,
    /// Whether to attach a depth buffer
    pub depth: bool,
}

impl FramebufferDesc {
    /// One HDR colour attachment plus depth
    pub const fn hdr(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            colour_attachments: 1,
            format: TextureFormat::Rgba16F,
            depth: true,
        }
    }

    /// One HDR colour attachment, no depth (post-processing targets)
    pub const fn colour_only(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            colour_attachments: 1,
            format: TextureFormat::Rgba16F,
            depth: false,
        }
    }
}

/// Owner of all pipeline resources
#[derive(Debug)]
pub struct ResourceManager {
    geometries: NamedArena<GeometryHandle, Geometry>,
    materials: NamedArena<MaterialHandle, Material>,
    shaders: NamedArena<ShaderHandle, ShaderProgram>,
    textures: NamedArena<TextureHandle, Texture>,
    sub_textures: NamedArena<SubTextureHandle, SubTexture>,
    framebuffers: NamedArena<FramebufferHandle, FrameBuffer>,
    uniform_buffers: NamedArena<UniformBufferHandle, UniformBuffer>,
    default_framebuffer: FramebufferHandle,
    fallback_texture: TextureHandle,
    white_texture: TextureHandle,
}

fn lookup<K: slotmap::Key, V>(arena: &NamedArena<K, V>, kind: &'static str, name: &str) -> Option<K> {
    let found = arena.find(name);
    if found.is_none() {
        log::error!("Missing {kind} resource '{name}'");
    }
    found
}

impl ResourceManager {
    /// Create a manager holding only the default framebuffer and the
    /// black fallback and white default textures
    pub fn new(backend: &mut dyn GraphicsBackend, viewport: (u32, u32)) -> Self {
        let mut textures: NamedArena<TextureHandle, Texture> = NamedArena::new();
        let mut solid = |name: &str, texel: [u8; 4]| {
            let gpu = backend.create_texture(&TextureDesc::rgba8(1, 1), Some(&texel[..]));
            textures.insert(
                name,
                Texture {
                    desc: TextureDesc::rgba8(1, 1),
                    gpu: Some(gpu),
                },
            )
        };
        let fallback_texture = solid(FALLBACK_TEXTURE, [0, 0, 0, 255]);
        let white_texture = solid(WHITE_TEXTURE, [255, 255, 255, 255]);

        let mut framebuffers = NamedArena::new();
        let default_framebuffer = framebuffers.insert(
            DEFAULT_FRAMEBUFFER,
            FrameBuffer::new(None, viewport.0, viewport.1, vec![(Attachment::Colour(0), fallback_texture)]),
        );

        Self {
            geometries: NamedArena::new(),
            materials: NamedArena::new(),
            shaders: NamedArena::new(),
            textures,
            sub_textures: NamedArena::new(),
            framebuffers,
            uniform_buffers: NamedArena::new(),
            default_framebuffer,
            fallback_texture,
            white_texture,
        }
    }

    // === Geometry ===

    /// Register geometry under a name
    pub fn add_geometry(&mut self, name: impl Into<String>, geometry: Geometry) -> GeometryHandle {
        let name = name.into();
        log::debug!(
            "Registered geometry '{name}' ({} vertices, {} indices)",
            geometry.vertices().len(),
            geometry.indices().len()
        );
        self.geometries.insert(name, geometry)
    }

    /// Resolve a geometry handle
    pub fn geometry(&self, handle: GeometryHandle) -> Option<&Geometry> {
        self.geometries.get(handle)
    }

    /// Find geometry by name
    pub fn find_geometry(&self, name: &str) -> Option<GeometryHandle> {
        lookup(&self.geometries, "geometry", name)
    }

    // === Shaders ===

    /// Create (or reuse) the named program
    pub fn create_shader(&mut self, backend: &mut dyn GraphicsBackend, name: &str) -> ShaderHandle {
        if let Some(existing) = self.shaders.find(name) {
            return existing;
        }
        let program = backend.create_program(name);
        log::debug!("Registered shader '{name}' as {program:?}");
        self.shaders.insert(name, ShaderProgram { program })
    }

    /// Resolve a shader handle
    pub fn shader(&self, handle: ShaderHandle) -> Option<&ShaderProgram> {
        self.shaders.get(handle)
    }

    /// Find a shader by name
    pub fn find_shader(&self, name: &str) -> Option<ShaderHandle> {
        lookup(&self.shaders, "shader", name)
    }

    // === Textures ===

    /// Create a texture with optional initial pixels
    pub fn create_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: impl Into<String>,
        desc: TextureDesc,
        pixels: Option<&[u8]>,
    ) -> TextureHandle {
        let gpu = backend.create_texture(&desc, pixels);
        self.textures.insert(name, Texture { desc, gpu: Some(gpu) })
    }

    /// Register a texture whose pixels are still loading
    pub fn reserve_texture(&mut self, name: impl Into<String>, desc: TextureDesc) -> TextureHandle {
        let name = name.into();
        log::debug!("Reserved pending texture '{name}'");
        self.textures.insert(name, Texture { desc, gpu: None })
    }

    /// Upload pixels for a texture, creating its GPU object if it was pending
    pub fn complete_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        handle: TextureHandle,
        pixels: &[u8],
    ) -> RenderResult<()> {
        let texture = self.textures.get_mut(handle).ok_or(RenderError::InvalidHandle("texture"))?;
        match texture.gpu {
            Some(gpu) => backend.write_texture(gpu, pixels),
            None => texture.gpu = Some(backend.create_texture(&texture.desc, Some(pixels))),
        }
        Ok(())
    }

    /// Resolve a texture handle
    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle)
    }

    /// Find a texture by name
    pub fn find_texture(&self, name: &str) -> Option<TextureHandle> {
        lookup(&self.textures, "texture", name)
    }

    /// Backend id of a texture, [`GpuTextureId::INVALID`] when stale or still pending
    pub fn texture_gpu(&self, handle: TextureHandle) -> GpuTextureId {
        self.textures
            .get(handle)
            .and_then(|texture| texture.gpu)
            .unwrap_or(GpuTextureId::INVALID)
    }

    /// The 1x1 black fallback texture
    pub fn fallback_texture(&self) -> TextureHandle {
        self.fallback_texture
    }

    /// The 1x1 white texture sampled by untextured sprites and meshes
    pub fn white_texture(&self) -> TextureHandle {
        self.white_texture
    }

    /// Register a region of a texture
    pub fn add_sub_texture(&mut self, name: impl Into<String>, sub_texture: SubTexture) -> SubTextureHandle {
        self.sub_textures.insert(name, sub_texture)
    }

    /// Resolve a sub-texture handle
    pub fn sub_texture(&self, handle: SubTextureHandle) -> Option<&SubTexture> {
        self.sub_textures.get(handle)
    }

    /// Find a sub-texture by name
    pub fn find_sub_texture(&self, name: &str) -> Option<SubTextureHandle> {
        lookup(&self.sub_textures, "sub-texture", name)
    }

    // === Materials ===

    /// Register a material
    pub fn add_material(&mut self, name: impl Into<String>, material: Material) -> MaterialHandle {
        self.materials.insert(name, material)
    }

    /// Resolve a material handle
    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    /// Edit a material in place
    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle)
    }

    /// Find a material by name
    pub fn find_material(&self, name: &str) -> Option<MaterialHandle> {
        lookup(&self.materials, "material", name)
    }

    // === Framebuffers ===

    /// Create an off-screen render target and its attachment textures
    pub fn create_framebuffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        desc: FramebufferDesc,
    ) -> FramebufferHandle {
        let mut attachments = Vec::with_capacity(usize::from(desc.colour_attachments) + 1);
        let mut colour_gpu = Vec::with_capacity(usize::from(desc.colour_attachments));
        for n in 0..desc.colour_attachments {
            let texture_desc = TextureDesc {
                width: desc.width,
                height: desc.height,
                format: desc.format,
            };
            let handle = self.create_texture(backend, format!("{name}.colour{n}"), texture_desc, None);
            colour_gpu.push(self.texture_gpu(handle));
            attachments.push((Attachment::Colour(n), handle));
        }

        let mut depth_gpu = None;
        if desc.depth {
            let texture_desc = TextureDesc {
                width: desc.width,
                height: desc.height,
                format: TextureFormat::Depth24,
            };
            let handle = self.create_texture(backend, format!("{name}.depth"), texture_desc, None);
            depth_gpu = Some(self.texture_gpu(handle));
            attachments.push((Attachment::Depth, handle));
        }

        let gpu = backend.create_framebuffer(&colour_gpu, depth_gpu);
        log::debug!("Created framebuffer '{name}' {}x{} as {gpu:?}", desc.width, desc.height);
        self.framebuffers
            .insert(name, FrameBuffer::new(Some(gpu), desc.width, desc.height, attachments))
    }

    /// Resolve a framebuffer handle
    pub fn framebuffer(&self, handle: FramebufferHandle) -> Option<&FrameBuffer> {
        self.framebuffers.get(handle)
    }

    /// Find a framebuffer by name
    pub fn find_framebuffer(&self, name: &str) -> Option<FramebufferHandle> {
        lookup(&self.framebuffers, "framebuffer", name)
    }

    /// Whether a framebuffer is registered under `name`, without logging a miss
    pub fn has_framebuffer(&self, name: &str) -> bool {
        self.framebuffers.find(name).is_some()
    }

    /// The well-known default framebuffer
    pub fn default_framebuffer(&self) -> FramebufferHandle {
        self.default_framebuffer
    }

    /// Texture behind a framebuffer attachment
    pub fn attachment_texture(&self, framebuffer: FramebufferHandle, attachment: Attachment) -> Option<TextureHandle> {
        self.framebuffers.get(framebuffer)?.attachment(attachment)
    }

    // === Uniform buffers ===

    /// Allocate a uniform buffer bound at `binding`
    pub fn create_uniform_buffer(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        binding: u32,
        size: usize,
    ) -> UniformBufferHandle {
        let gpu = backend.create_buffer(BufferKind::Uniform, size);
        log::debug!("Created uniform buffer '{name}' ({size} bytes) at binding {binding}");
        self.uniform_buffers.insert(name, UniformBuffer { binding, size, gpu })
    }

    /// Resolve a uniform buffer handle
    pub fn uniform_buffer(&self, handle: UniformBufferHandle) -> Option<&UniformBuffer> {
        self.uniform_buffers.get(handle)
    }

    /// Find a uniform buffer by name
    pub fn find_uniform_buffer(&self, name: &str) -> Option<UniformBufferHandle> {
        lookup(&self.uniform_buffers, "uniform buffer", name)
    }

    /// Upload a value into a uniform buffer
    pub fn write_uniform<T: bytemuck::Pod>(
        &self,
        backend: &mut dyn GraphicsBackend,
        handle: UniformBufferHandle,
        value: &T,
    ) -> RenderResult<()> {
        let buffer = self
            .uniform_buffers
            .get(handle)
            .ok_or(RenderError::InvalidHandle("uniform buffer"))?;
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() > buffer.size {
            return Err(RenderError::Backend(format!(
                "uniform value of {} bytes exceeds buffer size {}",
                bytes.len(),
                buffer.size
            )));
        }
        backend.write_buffer(buffer.gpu, 0, bytes);
        Ok(())
    }

    // === Loading and teardown ===

    /// Apply resources delivered by background loaders. Runs on the thread
    /// that owns the backend; returns how many payloads were applied.
    pub fn drain_inbox(&mut self, backend: &mut dyn GraphicsBackend, inbox: &ResourceInbox) -> usize {
        let mut applied = 0;
        for loaded in inbox.try_iter() {
            match loaded {
                LoadedResource::Texture { name, desc, pixels } => match self.textures.find(&name) {
                    Some(handle) => {
                        if let Err(err) = self.complete_texture(backend, handle, &pixels) {
                            log::error!("Failed to complete texture '{name}': {err}");
                            continue;
                        }
                    }
                    None => {
                        self.create_texture(backend, name, desc, Some(&pixels));
                    }
                },
                LoadedResource::Geometry { name, geometry } => {
                    if self.geometries.find(&name).is_some() {
                        log::warn!("Geometry '{name}' already registered, ignoring reload");
                        continue;
                    }
                    self.add_geometry(name, geometry);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Release every GPU object owned by the manager
    pub fn release_all(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, framebuffer) in self.framebuffers.drain() {
            if let Some(gpu) = framebuffer.gpu {
                backend.delete_framebuffer(gpu);
            }
        }
        for (_, texture) in self.textures.drain() {
            if let Some(gpu) = texture.gpu {
                backend.delete_texture(gpu);
            }
        }
        for (_, buffer) in self.uniform_buffers.drain() {
            backend.delete_buffer(buffer.gpu);
        }
        self.geometries.drain().for_each(drop);
        self.materials.drain().for_each(drop);
        self.shaders.drain().for_each(drop);
        self.sub_textures.drain().for_each(drop);
        log::debug!("Released all pipeline resources");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    fn manager() -> (RecordingBackend, ResourceManager) {
        let mut backend = RecordingBackend::new();
        let resources = ResourceManager::new(&mut backend, (64, 64));
        (backend, resources)
    }

    #[test]
    fn test_default_framebuffer_is_registered() {
        let (_, resources) = manager();
        let default = resources.find_framebuffer(DEFAULT_FRAMEBUFFER).unwrap();
        assert_eq!(default, resources.default_framebuffer());
        let framebuffer = resources.framebuffer(default).unwrap();
        assert!(framebuffer.is_default());
        assert_eq!(framebuffer.attachment(Attachment::Colour(0)), Some(resources.fallback_texture()));
    }

    #[test]
    fn test_white_texture_is_registered() {
        let (backend, resources) = manager();
        let white = resources.find_texture(WHITE_TEXTURE).unwrap();
        assert_eq!(white, resources.white_texture());
        assert_ne!(white, resources.fallback_texture());
        assert_eq!(backend.texel(resources.texture_gpu(white)), Some([1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_missing_name_yields_none() {
        let (_, resources) = manager();
        assert!(resources.find_framebuffer("hdrFBO").is_none());
        assert!(resources.find_material("water").is_none());
    }

    #[test]
    fn test_framebuffer_attachments() {
        let (mut backend, mut resources) = manager();
        let fb = resources.create_framebuffer(&mut backend, "hdrFBO", FramebufferDesc::hdr(64, 64));
        let colour = resources.attachment_texture(fb, Attachment::Colour(0)).unwrap();
        let depth = resources.attachment_texture(fb, Attachment::Depth).unwrap();
        assert_ne!(colour, depth);
        assert_eq!(resources.find_texture("hdrFBO.colour0"), Some(colour));
        assert!(resources.texture_gpu(colour).is_valid());
        assert!(resources.attachment_texture(fb, Attachment::Colour(1)).is_none());
    }

    #[test]
    fn test_pending_texture_resolves_to_invalid_until_completed() {
        let (mut backend, mut resources) = manager();
        let handle = resources.reserve_texture("albedo", TextureDesc::rgba8(1, 1));
        assert_eq!(resources.texture_gpu(handle), GpuTextureId::INVALID);

        resources.complete_texture(&mut backend, handle, &[255, 255, 255, 255]).unwrap();
        let gpu = resources.texture_gpu(handle);
        assert!(gpu.is_valid());
        assert_eq!(backend.texel(gpu), Some([1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_material_edits_are_visible_through_handle() {
        let (mut backend, mut resources) = manager();
        let shader = resources.create_shader(&mut backend, "mesh");
        let material = resources.add_material("rock", Material::new(shader));
        resources.material_mut(material).unwrap().tint = [1.0, 0.0, 0.0, 1.0];
        assert_eq!(resources.material(material).unwrap().tint, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_write_uniform_rejects_oversized_value() {
        let (mut backend, mut resources) = manager();
        let ubo = resources.create_uniform_buffer(&mut backend, "small", 0, 4);
        assert!(resources.write_uniform(&mut backend, ubo, &1u32).is_ok());
        assert!(resources.write_uniform(&mut backend, ubo, &[1u32, 2u32]).is_err());
    }

    #[test]
    fn test_release_all_frees_gpu_objects() {
        let (mut backend, mut resources) = manager();
        resources.create_framebuffer(&mut backend, "hdrFBO", FramebufferDesc::hdr(8, 8));
        resources.create_uniform_buffer(&mut backend, "camera", 0, 64);
        resources.release_all(&mut backend);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_buffers(BufferKind::Uniform), 0);
    }
}
