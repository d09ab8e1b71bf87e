//! # Batching Renderers
//!
//! The two renderers every pass drives, plus the pieces they share.
//!
//! ## Architecture
//!
//! - **Renderer3D**: depth-tested opaque meshes; groups a flush by shader
//! - **Renderer2D**: alpha-blended quads and text; preserves submission order
//! - **TextureUnitManager**: LRU pool of texture units, reset every flush
//! - **StagingBuffer**: CPU arrays mirrored into GPU buffers
//! - **RenderingContext**: explicit owner of backend, resources and renderers
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialised -> Initialised -> { begin -> submit* -> (flush)* -> end }* -> Destroyed
//! ```
//!
//! Every precondition violation is logged where it is detected and returned
//! as a [`RenderError`]; the call itself has no effect on the GPU.

mod batch;
mod context;
mod renderer_2d;
mod renderer_3d;
mod state;
mod stats;
mod text;
mod texture_units;
mod uniforms;

pub use batch::StagingBuffer;
pub use context::{GpuContext, RenderingContext};
pub use renderer_2d::{QuadData, Renderer2D, Vertex2D};
pub use renderer_3d::{MeshInstance, Renderer3D};
pub use state::{GpuState, StateTracker};
pub use stats::RendererStats;
pub use text::{FontAtlas, GlyphRun};
pub use texture_units::TextureUnitManager;
pub use uniforms::{
    BloomUniform, BlurUniform, CameraUniform, ClipPlaneUniform, LightUniform, SceneWideUniforms, StandardUniforms,
};

use crate::scene::MeshLayer;

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors reported by the rendering pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// Renderer used before `initialise`
    #[error("renderer used before initialise")]
    NotInitialised,

    /// `initialise` called twice
    #[error("renderer already initialised")]
    AlreadyInitialised,

    /// `submit`, `flush` or `end` outside a begin/end cycle
    #[error("no batch is being recorded")]
    NotRecording,

    /// `begin` while a batch is open
    #[error("a batch is already being recorded")]
    AlreadyRecording,

    /// Renderer used after `destroy`
    #[error("renderer has been destroyed")]
    Destroyed,

    /// Capacity rejected at initialisation
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    /// Named resource not registered
    #[error("missing {kind} '{name}'")]
    MissingResource {
        /// Resource kind
        kind: &'static str,
        /// Requested name
        name: String,
    },

    /// Handle does not refer to a live resource
    #[error("stale or invalid {0} handle")]
    InvalidHandle(&'static str),

    /// Geometry larger than the renderer's shared buffers
    #[error("geometry of {vertices} vertices / {indices} indices exceeds renderer capacity")]
    GeometryTooLarge {
        /// Vertex count
        vertices: usize,
        /// Index count
        indices: usize,
    },

    /// Backend not available in this build
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// Backend-level failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Which renderer an entity's components are routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// Sprites and text
    Renderer2D,
    /// Meshes on the given layer
    Renderer3D(MeshLayer),
}

/// Lifecycle state shared by both batching renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RendererState {
    #[default]
    Uninitialised,
    Initialised,
    Recording,
    Destroyed,
}

impl RendererState {
    /// Log and return the violation if a batch is not open
    pub(crate) fn require_recording(self, renderer: &str) -> RenderResult<()> {
        let err = match self {
            Self::Recording => return Ok(()),
            Self::Uninitialised => RenderError::NotInitialised,
            Self::Destroyed => RenderError::Destroyed,
            Self::Initialised => RenderError::NotRecording,
        };
        log::error!("{renderer}: {err}");
        Err(err)
    }

    /// Log and return the violation if a batch cannot be opened
    pub(crate) fn require_idle(self, renderer: &str) -> RenderResult<()> {
        let err = match self {
            Self::Initialised => return Ok(()),
            Self::Uninitialised => RenderError::NotInitialised,
            Self::Destroyed => RenderError::Destroyed,
            Self::Recording => RenderError::AlreadyRecording,
        };
        log::error!("{renderer}: {err}");
        Err(err)
    }
}

/// Log a renderer error and hand it back
pub(crate) fn report(renderer: &str, err: RenderError) -> RenderError {
    log::error!("{renderer}: {err}");
    err
}
