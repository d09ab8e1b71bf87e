//! Texture unit allocation
//!
//! A device exposes a handful of texture units per draw while a frame may
//! touch any number of textures. The manager hands out units on demand and
//! evicts the least recently used one when the pool is exhausted.

use crate::backend::{GpuTextureId, GraphicsBackend};
use crate::config::MAX_TEXTURE_UNITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    texture: GpuTextureId,
    last_used: u64,
}

/// Bounded pool of texture units.
///
/// Assignments live for one flush window: [`reset`](Self::reset) forgets
/// them all, after which the first texture acquired lands on unit 0 again.
#[derive(Debug, Clone)]
pub struct TextureUnitManager {
    slots: Vec<Option<Slot>>,
    clock: u64,
    binds: usize,
}

impl TextureUnitManager {
    /// Create a pool of `units` texture units, clamped to `1..=32`
    pub fn new(units: u32) -> Self {
        let units = units.clamp(1, MAX_TEXTURE_UNITS) as usize;
        Self {
            slots: vec![None; units],
            clock: 0,
            binds: 0,
        }
    }

    /// Number of units in the pool
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Units assigned in the current window
    pub fn assigned(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Unit currently holding `texture`
    pub fn unit_of(&self, texture: GpuTextureId) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.is_some_and(|s| s.texture == texture))
            .map(|unit| unit as u32)
    }

    /// Whether every texture in `textures` can be acquired without evicting
    /// an assignment made in this window
    pub fn fits(&self, textures: &[GpuTextureId]) -> bool {
        let mut missing: Vec<GpuTextureId> = Vec::with_capacity(textures.len());
        for texture in textures.iter().copied().filter(|t| t.is_valid()) {
            if self.unit_of(texture).is_none() && !missing.contains(&texture) {
                missing.push(texture);
            }
        }
        let free = self.slots.iter().filter(|slot| slot.is_none()).count();
        missing.len() <= free
    }

    /// Bind `texture` to a unit and return the unit index.
    ///
    /// An already bound texture keeps its unit. An invalid id falls back to
    /// unit 0 without binding anything.
    pub fn acquire(&mut self, backend: &mut dyn GraphicsBackend, texture: GpuTextureId) -> u32 {
        if !texture.is_valid() {
            log::warn!("Texture unit requested for an invalid texture, falling back to unit 0");
            return 0;
        }

        self.clock += 1;
        if let Some(unit) = self.unit_of(texture) {
            if let Some(slot) = self.slots[unit as usize].as_mut() {
                slot.last_used = self.clock;
            }
            return unit;
        }

        let unit = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let lru = self
                    .slots
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, slot)| slot.map_or(0, |s| s.last_used))
                    .map_or(0, |(unit, _)| unit);
                log::trace!("Evicting texture unit {lru}");
                lru
            }
        };

        backend.bind_texture(unit as u32, texture);
        self.binds += 1;
        self.slots[unit] = Some(Slot {
            texture,
            last_used: self.clock,
        });
        unit as u32
    }

    /// Forget every assignment; called once per flush
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Number of backend binds issued since the last call
    pub fn take_bind_count(&mut self) -> usize {
        std::mem::take(&mut self.binds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCommand, RecordingBackend};

    fn ids(range: std::ops::Range<u32>) -> Vec<GpuTextureId> {
        range.map(GpuTextureId).collect()
    }

    #[test]
    fn test_same_texture_keeps_its_unit() {
        let mut backend = RecordingBackend::new();
        let mut units = TextureUnitManager::new(4);
        let a = units.acquire(&mut backend, GpuTextureId(10));
        let b = units.acquire(&mut backend, GpuTextureId(11));
        assert_ne!(a, b);
        assert_eq!(units.acquire(&mut backend, GpuTextureId(10)), a);
        assert_eq!(backend.count(|c| matches!(c, GpuCommand::BindTexture { .. })), 2);
    }

    #[test]
    fn test_never_exceeds_capacity_and_evicts_lru() {
        let mut backend = RecordingBackend::new();
        let mut units = TextureUnitManager::new(2);
        let first = units.acquire(&mut backend, GpuTextureId(1));
        units.acquire(&mut backend, GpuTextureId(2));
        // Touch 1 so 2 becomes the least recently used
        units.acquire(&mut backend, GpuTextureId(1));
        let third = units.acquire(&mut backend, GpuTextureId(3));

        assert!(third < 2);
        assert_eq!(units.unit_of(GpuTextureId(1)), Some(first));
        assert_eq!(units.unit_of(GpuTextureId(2)), None);
        assert_eq!(units.assigned(), 2);
    }

    #[test]
    fn test_unique_units_within_window() {
        let mut backend = RecordingBackend::new();
        let mut units = TextureUnitManager::new(8);
        let mut seen = std::collections::HashMap::new();
        for texture in ids(1..6).into_iter().cycle().take(30) {
            let unit = units.acquire(&mut backend, texture);
            assert!(unit < units.capacity());
            assert_eq!(*seen.entry(texture).or_insert(unit), unit);
        }
    }

    #[test]
    fn test_invalid_texture_falls_back_to_unit_zero() {
        let mut backend = RecordingBackend::new();
        let mut units = TextureUnitManager::new(4);
        assert_eq!(units.acquire(&mut backend, GpuTextureId::INVALID), 0);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_fits_and_reset() {
        let mut backend = RecordingBackend::new();
        let mut units = TextureUnitManager::new(2);
        assert!(units.fits(&ids(1..3)));
        assert!(!units.fits(&ids(1..4)));
        units.acquire(&mut backend, GpuTextureId(1));
        units.acquire(&mut backend, GpuTextureId(2));
        assert!(units.fits(&[GpuTextureId(1), GpuTextureId::INVALID]));
        assert!(!units.fits(&[GpuTextureId(3)]));

        units.reset();
        assert_eq!(units.assigned(), 0);
        assert_eq!(units.acquire(&mut backend, GpuTextureId(3)), 0);
        assert_eq!(units.take_bind_count(), 3);
        assert_eq!(units.take_bind_count(), 0);
    }

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(TextureUnitManager::new(0).capacity(), 1);
        assert_eq!(TextureUnitManager::new(64).capacity(), MAX_TEXTURE_UNITS);
    }
}
