//! # Scene
//!
//! What the pass chain renders: a camera, a light, a tree of entities with
//! render components, and the ordered list of passes.
//!
//! The flattened list of visible entities (with world transforms) is cached
//! and only rebuilt after the tree changes.

mod camera;
mod entity;

pub use camera::Camera;
pub use entity::{Component, Entity, EntityId, Mesh, MeshLayer, Sprite, Text};

use slotmap::SlotMap;

use crate::foundation::math::{Colour, Mat4};
use crate::passes::RenderPass;
use crate::render::LightUniform;

/// A renderable scene and its pass chain
#[derive(Debug)]
pub struct Scene {
    /// Scene name, used in logs
    pub name: String,
    /// Main camera
    pub camera: Camera,
    /// Directional light
    pub light: LightUniform,
    /// Colour the geometry pass clears to
    pub clear_colour: Colour,
    /// Whether the composite pass adds bloom
    pub bloom_enabled: bool,
    /// Tone-mapping exposure
    pub exposure: f32,
    /// Draw opaque geometry as lines
    pub wireframe: bool,
    entities: SlotMap<EntityId, Entity>,
    roots: Vec<EntityId>,
    visible: Vec<(EntityId, Mat4)>,
    dirty: bool,
    passes: Vec<RenderPass>,
    attached: bool,
}

impl Scene {
    /// Empty scene with default camera and light
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            camera: Camera::default(),
            light: LightUniform::default(),
            clear_colour: [0.005, 0.005, 0.005, 1.0],
            bloom_enabled: true,
            exposure: 1.0,
            wireframe: false,
            entities: SlotMap::with_key(),
            roots: Vec::new(),
            visible: Vec::new(),
            dirty: false,
            passes: Vec::new(),
            attached: false,
        }
    }

    // === Entities ===

    /// Add a root entity
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = self.entities.insert(entity);
        self.roots.push(id);
        self.dirty = true;
        id
    }

    /// Add an entity under `parent`; `None` if the parent does not exist
    pub fn add_child(&mut self, parent: EntityId, mut entity: Entity) -> Option<EntityId> {
        if !self.entities.contains_key(parent) {
            log::error!("Scene '{}': parent entity {parent:?} does not exist", self.name);
            return None;
        }
        entity.parent = Some(parent);
        let id = self.entities.insert(entity);
        if let Some(parent) = self.entities.get_mut(parent) {
            parent.children.push(id);
        }
        self.dirty = true;
        Some(id)
    }

    /// Remove an entity and its descendants; returns how many were removed
    pub fn remove_entity(&mut self, id: EntityId) -> usize {
        let Some(entity) = self.entities.get(id) else {
            return 0;
        };
        match entity.parent {
            Some(parent) => {
                if let Some(parent) = self.entities.get_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(entity) = self.entities.remove(next) {
                stack.extend(entity.children);
                removed += 1;
            }
        }
        self.dirty = true;
        removed
    }

    /// Look up an entity
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Edit an entity; marks the cached list dirty since transforms or
    /// visibility may change
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.dirty = true;
        self.entities.get_mut(id)
    }

    /// Number of entities in the tree
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Whether the cached list is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the cached list if the tree changed; returns whether it did
    pub fn refresh_entities(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.visible.clear();
        let mut stack: Vec<(EntityId, Mat4)> = self.roots.iter().rev().map(|id| (*id, Mat4::identity())).collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if !entity.visible {
                continue;
            }
            let world = parent_world * entity.transform;
            self.visible.push((id, world));
            stack.extend(entity.children.iter().rev().map(|child| (*child, world)));
        }
        self.dirty = false;
        log::trace!("Scene '{}': {} visible entities", self.name, self.visible.len());
        true
    }

    /// Visible entities with world transforms, depth-first in insertion order
    pub fn visible_entities(&self) -> impl Iterator<Item = (&Entity, &Mat4)> {
        self.visible
            .iter()
            .filter_map(|(id, world)| self.entities.get(*id).map(|entity| (entity, world)))
    }

    // === Passes ===

    /// Append a pass; returns its index
    pub fn add_pass(&mut self, pass: RenderPass) -> usize {
        self.passes.push(pass);
        self.reindex_passes();
        self.passes.len() - 1
    }

    /// Insert a pass at `index` (clamped), shifting later passes
    pub fn insert_pass(&mut self, index: usize, pass: RenderPass) -> usize {
        let index = index.min(self.passes.len());
        self.passes.insert(index, pass);
        self.reindex_passes();
        index
    }

    /// Remove the named pass
    pub fn remove_pass(&mut self, name: &str) -> Option<RenderPass> {
        let index = self.pass_index(name)?;
        let pass = self.passes.remove(index);
        self.reindex_passes();
        Some(pass)
    }

    fn reindex_passes(&mut self) {
        for (index, pass) in self.passes.iter_mut().enumerate() {
            pass.set_index(index);
        }
        self.attached = false;
    }

    /// Ordered pass list
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub(crate) fn passes_mut(&mut self) -> &mut [RenderPass] {
        &mut self.passes
    }

    /// Pass at `index`
    pub fn render_pass(&self, index: usize) -> Option<&RenderPass> {
        self.passes.get(index)
    }

    /// Pass called `name`
    pub fn render_pass_by_name(&self, name: &str) -> Option<&RenderPass> {
        self.passes.iter().find(|pass| pass.name() == name)
    }

    /// Index of the pass called `name`
    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|pass| pass.name() == name)
    }

    /// Enable or disable a pass; returns `false` if there is no such pass
    pub fn set_pass_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.passes.iter_mut().find(|pass| pass.name() == name) {
            Some(pass) => {
                pass.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Whether the pass list has been attached since it last changed
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn mark_attached(&mut self) {
        self.attached = true;
    }
}
