//! Per-frame renderer counters

/// Counters exposed by each batching renderer.
///
/// Everything except `geometry_uploads` is cleared by
/// [`reset_frame`](Self::reset_frame) at the start of each frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Submissions accepted this frame
    pub submissions: usize,
    /// Draw count of every non-empty flush this frame, in order
    pub flush_sizes: Vec<usize>,
    /// Indirect multi-draw calls issued this frame
    pub multi_draw_calls: usize,
    /// Texture binds issued this frame
    pub texture_binds: usize,
    /// Geometry uploads over the renderer's lifetime
    pub geometry_uploads: usize,
}

impl RendererStats {
    /// Number of non-empty flushes this frame
    pub fn flushes(&self) -> usize {
        self.flush_sizes.len()
    }

    /// Draws issued this frame
    pub fn total_draws(&self) -> usize {
        self.flush_sizes.iter().sum()
    }

    /// Clear the per-frame counters
    pub fn reset_frame(&mut self) {
        *self = Self {
            geometry_uploads: self.geometry_uploads,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_frame_keeps_lifetime_counters() {
        let mut stats = RendererStats {
            submissions: 3,
            flush_sizes: vec![2, 1],
            multi_draw_calls: 2,
            texture_binds: 4,
            geometry_uploads: 3,
        };
        assert_eq!(stats.flushes(), 2);
        assert_eq!(stats.total_draws(), 3);

        stats.reset_frame();
        assert_eq!(stats.flushes(), 0);
        assert_eq!(stats.submissions, 0);
        assert_eq!(stats.geometry_uploads, 3);
    }
}
