//! Pipeline configuration
//!
//! Capacities for both batching renderers, texture-unit budget, backend
//! selection and logging level.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::backend::BackendKind;
use crate::foundation::math::Colour;

/// Hard upper bound on texture units, regardless of what is configured
pub const MAX_TEXTURE_UNITS: u32 = 32;

/// Staging capacities of one batching renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCapacity {
    /// Maximum submissions held before an automatic flush
    pub batch_capacity: usize,
    /// Vertices the shared vertex buffer can hold
    pub vertex_capacity: usize,
    /// Indices the shared index buffer can hold
    pub index_capacity: usize,
}

impl BatchCapacity {
    /// Create a capacity triple
    pub const fn new(batch_capacity: usize, vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            batch_capacity,
            vertex_capacity,
            index_capacity,
        }
    }

    /// Validate that every capacity is non-zero and at least the given minimums
    pub fn validate(&self, min_vertices: usize, min_indices: usize) -> Result<(), String> {
        if self.batch_capacity == 0 {
            return Err("batch capacity must be at least 1".to_string());
        }
        if self.vertex_capacity < min_vertices.max(1) {
            return Err(format!("vertex capacity must be at least {}", min_vertices.max(1)));
        }
        if self.index_capacity < min_indices.max(1) {
            return Err(format!("index capacity must be at least {}", min_indices.max(1)));
        }
        Ok(())
    }
}

/// # Render Pipeline Configuration
///
/// Everything the [`RenderSystem`](crate::RenderSystem) needs to build its
/// rendering context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Graphics backend to drive. Defaults to [`BackendKind::Null`]; the
    /// recording backend keeps every command and is meant for tests.
    pub backend: BackendKind,
    /// Default log filter used by [`crate::foundation::logging::init_with_level`]
    pub log_level: String,
    /// Texture units available to each batching renderer
    pub texture_units: u32,
    /// Capacities of the 2D quad/text renderer
    pub renderer_2d: BatchCapacity,
    /// Capacities of the 3D mesh renderer
    pub renderer_3d: BatchCapacity,
    /// Clear colour used when a scene does not override it
    pub clear_colour: Colour,
    /// Size of the default framebuffer and of the standard render targets
    pub viewport: (u32, u32),
}

impl RenderConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            backend: BackendKind::Null,
            log_level: "info".to_string(),
            texture_units: 16,
            renderer_2d: BatchCapacity::new(1000, 4000, 6000),
            renderer_3d: BatchCapacity::new(1000, 1 << 20, 3 << 20),
            clear_colour: [0.005, 0.005, 0.005, 1.0],
            viewport: (1280, 720),
        }
    }

    /// Set the backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the texture-unit budget
    pub fn with_texture_units(mut self, units: u32) -> Self {
        self.texture_units = units;
        self
    }

    /// Set the 2D renderer capacities
    pub fn with_renderer_2d(mut self, capacity: BatchCapacity) -> Self {
        self.renderer_2d = capacity;
        self
    }

    /// Set the 3D renderer capacities
    pub fn with_renderer_3d(mut self, capacity: BatchCapacity) -> Self {
        self.renderer_3d = capacity;
        self
    }

    /// Set the viewport size
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Set the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.texture_units == 0 {
            return Err(ConfigError::Invalid("texture units must be at least 1".to_string()));
        }
        if self.texture_units > MAX_TEXTURE_UNITS {
            return Err(ConfigError::Invalid(format!(
                "texture units must not exceed {MAX_TEXTURE_UNITS}"
            )));
        }
        // A 2D submission is at least one quad
        self.renderer_2d
            .validate(4, 6)
            .map_err(|e| ConfigError::Invalid(format!("renderer_2d: {e}")))?;
        self.renderer_3d
            .validate(1, 1)
            .map_err(|e| ConfigError::Invalid(format!("renderer_3d: {e}")))?;
        if self.viewport.0 == 0 || self.viewport.1 == 0 {
            return Err(ConfigError::Invalid("viewport must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RenderConfig {}
