// renderer/objects.rs (cull-stage records)
use bytemuck::{Pod, Zeroable};

use crate::asset::{DrawMesh, RenderBounds};
use glam::Mat4;

/// Indexed indirect draw command plus the ids the cull shader needs.
/// The first five fields match `wgpu::util::DrawIndexedIndirectArgs`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct IndirectDrawRecord {
    pub index_count: u32,    // 4 bytes
    pub instance_count: u32, // 4 bytes, written by the cull stage
    pub first_index: u32,    // 4 bytes
    pub vertex_offset: i32,  // 4 bytes
    pub first_instance: u32, // 4 bytes
    pub object_id: u32,      // 4 bytes
    pub batch_id: u32,       // 4 bytes
}

impl IndirectDrawRecord {
    pub fn new(mesh: &DrawMesh, first_instance: u32, batch_id: u32) -> Self {
        Self {
            index_count: mesh.index_count,
            instance_count: 0,
            first_index: mesh.first_index,
            vertex_offset: mesh.first_vertex as i32,
            first_instance,
            object_id: 0,
            batch_id,
        }
    }
}

/// Which object a cull candidate is and which indirect batch it feeds.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct InstanceRecord {
    pub object_id: u32,
    pub batch_id: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct ObjectDataRecord {
    pub model: [[f32; 4]; 4],    // 64 bytes
    pub origin_radius: [f32; 4], // 16 bytes
    pub extents_valid: [f32; 4], // 16 bytes
}

impl ObjectDataRecord {
    pub fn new(model: Mat4, bounds: &RenderBounds) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            origin_radius: bounds.origin.extend(bounds.radius).to_array(),
            extents_valid: bounds
                .extents
                .extend(if bounds.valid { 1.0 } else { 0.0 })
                .to_array(),
        }
    }
}
