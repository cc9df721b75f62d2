use std::sync::Arc;

use glam::Vec3;

/// Bounding sphere and box of a mesh or placed object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderBounds {
    pub origin: Vec3,
    pub radius: f32,
    pub extents: Vec3,
    pub valid: bool,
}

impl RenderBounds {
    pub const INVALID: Self = Self {
        origin: Vec3::ZERO,
        radius: 0.0,
        extents: Vec3::ZERO,
        valid: false,
    };

    pub fn from_box(origin: Vec3, extents: Vec3) -> Self {
        Self {
            origin,
            radius: extents.length(),
            extents,
            valid: true,
        }
    }
}

impl Default for RenderBounds {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Raw GPU buffers of a loaded mesh, used as copy sources when meshes are
/// merged into the shared vertex/index buffers. Indices are `u32`.
#[derive(Debug)]
pub struct GeometryBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub vertex_stride: u64,
}

/// Mesh geometry as handed over by the asset subsystem.
#[derive(Debug)]
pub struct MeshGeometry {
    pub label: String,
    pub vertex_count: u32,
    pub index_count: u32,
    pub bounds: RenderBounds,
    pub buffers: Option<GeometryBuffers>,
}

impl MeshGeometry {
    pub fn new(label: impl Into<String>, vertex_count: u32, index_count: u32) -> Self {
        Self {
            label: label.into(),
            vertex_count,
            index_count,
            bounds: RenderBounds::INVALID,
            buffers: None,
        }
    }

    pub fn with_bounds(mut self, bounds: RenderBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_buffers(mut self, buffers: GeometryBuffers) -> Self {
        self.buffers = Some(buffers);
        self
    }
}

/// Mesh-level draw data: where the mesh lives in the merged buffers and
/// whether it has been copied there yet.
#[derive(Debug, Clone)]
pub struct DrawMesh {
    pub first_vertex: u32,
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_count: u32,
    pub is_merged: bool,
    pub original: Arc<MeshGeometry>,
}

impl DrawMesh {
    pub fn new(original: Arc<MeshGeometry>) -> Self {
        Self {
            first_vertex: 0,
            first_index: 0,
            index_count: original.index_count,
            vertex_count: original.vertex_count,
            is_merged: false,
            original,
        }
    }
}
