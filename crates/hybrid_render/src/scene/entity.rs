//! Scene entities and their render components

use crate::foundation::math::{Colour, Mat4};
use crate::render::{FontAtlas, GlyphRun, QuadData, RenderResult, RendererKind, RenderingContext};
use crate::resources::{GeometryHandle, MaterialHandle};

slotmap::new_key_type! {
    /// Handle to an [`Entity`] in a [`Scene`](super::Scene)
    pub struct EntityId;
}

/// Which 3D pass draws a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeshLayer {
    /// Regular opaque geometry
    #[default]
    Opaque,
    /// Water surfaces, drawn by the water pass after reflection/refraction
    WaterSurface,
}

/// 2D quad
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Quad size, region, texture and colour
    pub quad: QuadData,
    /// Material, or `None` to rely on the pass's shader
    pub material: Option<MaterialHandle>,
}

/// 3D mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mesh {
    /// Geometry owned by the resource manager
    pub geometry: GeometryHandle,
    /// Shared material
    pub material: MaterialHandle,
    /// Pass that draws it
    pub layer: MeshLayer,
    /// Extra per-entity tint
    pub tint: Option<Colour>,
}

impl Mesh {
    /// Opaque mesh
    pub fn new(geometry: GeometryHandle, material: MaterialHandle) -> Self {
        Self {
            geometry,
            material,
            layer: MeshLayer::Opaque,
            tint: None,
        }
    }

    /// Water surface mesh
    pub fn water(geometry: GeometryHandle, material: MaterialHandle) -> Self {
        Self {
            layer: MeshLayer::WaterSurface,
            ..Self::new(geometry, material)
        }
    }
}

/// Text label
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    /// String, size and colour
    pub run: GlyphRun,
    /// Font
    pub font: FontAtlas,
    /// Material, or `None` to rely on the pass's shader
    pub material: Option<MaterialHandle>,
}

/// Render-relevant component
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// Drawn by [`Renderer2D`](crate::render::Renderer2D)
    Sprite(Sprite),
    /// Drawn by [`Renderer3D`](crate::render::Renderer3D)
    Mesh(Mesh),
    /// Drawn by [`Renderer2D`](crate::render::Renderer2D)
    Text(Text),
}

impl Component {
    fn routes_to(&self, kind: RendererKind) -> bool {
        match (self, kind) {
            (Component::Sprite(_) | Component::Text(_), RendererKind::Renderer2D) => true,
            (Component::Mesh(mesh), RendererKind::Renderer3D(layer)) => mesh.layer == layer,
            _ => false,
        }
    }
}

/// Node of the scene tree
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Display name
    pub name: String,
    /// Transform relative to the parent
    pub transform: Mat4,
    /// Hidden entities and their children are not drawn
    pub visible: bool,
    components: Vec<Component>,
    pub(super) parent: Option<EntityId>,
    pub(super) children: Vec<EntityId>,
}

impl Entity {
    /// Entity at the parent's origin without components
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::identity(),
            visible: true,
            components: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the local transform
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Attach a component
    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Attach a component to an existing entity
    pub fn add_component(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Attached components
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Parent entity
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Whether any component is drawn by `kind`
    pub fn renders_with(&self, kind: RendererKind) -> bool {
        self.components.iter().any(|c| c.routes_to(kind))
    }

    /// Submit every component drawn by `kind` to the matching renderer.
    ///
    /// The renderers have already logged any rejected submission; the
    /// remaining components are still submitted.
    pub fn on_render(&self, world: &Mat4, kind: RendererKind, ctx: &mut RenderingContext) {
        for component in self.components.iter().filter(|c| c.routes_to(kind)) {
            let result: RenderResult<()> = match component {
                Component::Sprite(sprite) => {
                    ctx.renderer_2d
                        .submit(&mut ctx.gpu, &sprite.quad, sprite.material, world)
                }
                Component::Text(text) => {
                    ctx.renderer_2d
                        .submit_text(&mut ctx.gpu, &text.run, &text.font, text.material, world)
                }
                Component::Mesh(mesh) => {
                    ctx.renderer_3d
                        .submit(&mut ctx.gpu, mesh.geometry, mesh.material, world, mesh.tint)
                }
            };
            if result.is_err() {
                log::trace!("Entity '{}' skipped a {kind:?} submission", self.name);
            }
        }
    }
}
