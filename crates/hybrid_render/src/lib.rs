//! # Hybrid Render
//!
//! A multi-pass render pipeline driving two batching renderers over a
//! backend-agnostic command layer.
//!
//! ## Features
//!
//! - **Batching renderers**: `Renderer3D` for depth-tested meshes (geometry
//!   uploaded once, drawn with multi-draw indirect) and `Renderer2D` for
//!   blended quads and text
//! - **Texture unit pooling**: LRU reuse of a bounded set of sampler units
//! - **Pass chain**: geometry, water, bloom, composite and UI passes with
//!   explicit, name-resolved dependencies
//! - **Backend abstraction**: a recording backend for headless runs and tests
//!
//! ## Quick Start
//!
//! ```rust
//! use hybrid_render::prelude::*;
//!
//! let mut system = RenderSystem::new(RenderConfig::default()).unwrap();
//! install_standard_resources(system.context_mut());
//!
//! let mut scene = Scene::new("demo");
//! for pass in StandardPipeline::default().passes() {
//!     scene.add_pass(pass);
//! }
//! system.on_render(&mut scene);
//! system.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod foundation;
pub mod passes;
pub mod render;
pub mod resources;
pub mod scene;

mod system;

pub use render::{RenderError, RenderResult, RenderingContext};
pub use system::RenderSystem;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        backend::{BackendKind, GraphicsBackend, RecordingBackend},
        config::{BatchCapacity, Config, RenderConfig},
        foundation::math::{Colour, Mat4, Vec3},
        passes::{install_standard_resources, PassKind, PassSource, RenderPass, StandardPipeline},
        render::{FontAtlas, GlyphRun, QuadData, RendererKind},
        resources::{Attachment, FramebufferDesc, Geometry, Material},
        scene::{Camera, Component, Entity, Mesh, MeshLayer, Scene, Sprite, Text},
        RenderError, RenderResult, RenderSystem, RenderingContext,
    };
}
