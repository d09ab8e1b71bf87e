//! Fixed-function state deltas between passes

use bitflags::bitflags;

use crate::backend::{Capability, GraphicsBackend};

bitflags! {
    /// Capabilities a pass wants enabled
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GpuState: u8 {
        /// Depth test and depth writes
        const DEPTH_TEST = 1 << 0;
        /// Alpha blending
        const BLEND = 1 << 1;
        /// Back-face culling
        const CULL_FACE = 1 << 2;
        /// User clip distance 0
        const CLIP_DISTANCE0 = 1 << 3;
        /// Line polygon mode
        const WIREFRAME = 1 << 4;
    }
}

impl GpuState {
    const CAPABILITIES: [(GpuState, Capability); 5] = [
        (GpuState::DEPTH_TEST, Capability::DepthTest),
        (GpuState::BLEND, Capability::Blend),
        (GpuState::CULL_FACE, Capability::CullFace),
        (GpuState::CLIP_DISTANCE0, Capability::ClipDistance0),
        (GpuState::WIREFRAME, Capability::Wireframe),
    ];
}

/// Tracks the enabled capabilities so passes only issue the changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateTracker {
    current: GpuState,
    baseline: GpuState,
}

impl StateTracker {
    /// Tracker whose baseline is everything disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// State the device is in
    pub fn current(&self) -> GpuState {
        self.current
    }

    /// State restored after every pass
    pub fn baseline(&self) -> GpuState {
        self.baseline
    }

    /// Move the device to `desired`, toggling only what differs
    pub fn apply(&mut self, backend: &mut dyn GraphicsBackend, desired: GpuState) {
        let changed = self.current ^ desired;
        for (flag, capability) in GpuState::CAPABILITIES {
            if changed.contains(flag) {
                backend.set_capability(capability, desired.contains(flag));
            }
        }
        self.current = desired;
    }

    /// Return to the baseline
    pub fn restore(&mut self, backend: &mut dyn GraphicsBackend) {
        let baseline = self.baseline;
        self.apply(backend, baseline);
    }
}
