use std::sync::Arc;

use bitflags::bitflags;
use glam::Mat4;

use crate::asset::{DrawMesh, Handle, Material, MeshGeometry, RenderBounds};
use crate::renderer::{PassObject, PerPass};

bitflags! {
    /// Which families of passes an object is willing to be drawn in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DrawPassFlags: u32 {
        const FORWARD = 1 << 0;
        const SHADOW = 1 << 1;
    }
}

impl Default for DrawPassFlags {
    fn default() -> Self {
        Self::FORWARD | Self::SHADOW
    }
}

pub type MaterialHandle = Handle<Arc<Material>>;

/// Description of an object to place in the scene.
#[derive(Debug, Clone)]
pub struct MeshObject {
    pub mesh: Arc<MeshGeometry>,
    pub material: Arc<Material>,
    pub transform: Mat4,
    pub bounds: RenderBounds,
    pub custom_sort_key: u32,
    pub draw_passes: DrawPassFlags,
}

impl MeshObject {
    /// Object at the origin, using the mesh's own bounds.
    pub fn new(mesh: Arc<MeshGeometry>, material: Arc<Material>) -> Self {
        let bounds = mesh.bounds;
        Self {
            mesh,
            material,
            transform: Mat4::IDENTITY,
            bounds,
            custom_sort_key: 0,
            draw_passes: DrawPassFlags::default(),
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_bounds(mut self, bounds: RenderBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_sort_key(mut self, key: u32) -> Self {
        self.custom_sort_key = key;
        self
    }

    pub fn with_draw_passes(mut self, passes: DrawPassFlags) -> Self {
        self.draw_passes = passes;
        self
    }
}

/// One placed instance in the object table.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub mesh: Handle<DrawMesh>,
    pub material: MaterialHandle,
    pub transform: Mat4,
    pub bounds: RenderBounds,
    pub custom_sort_key: u32,
    pub draw_passes: DrawPassFlags,
    pub(crate) update_index: Option<usize>,
    pub(crate) pass_indices: PerPass<Option<Handle<PassObject>>>,
    pub(crate) registered: bool,
}

impl RenderObject {
    pub fn pass_index(&self, pass: crate::renderer::MeshPassType) -> Option<Handle<PassObject>> {
        self.pass_indices[pass]
    }

    pub fn is_dirty(&self) -> bool {
        self.update_index.is_some()
    }

    /// False once the object has been unregistered from the scene.
    pub fn is_registered(&self) -> bool {
        self.registered
    }
}
