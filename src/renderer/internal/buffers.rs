use std::mem;

use crate::renderer::{IndirectDrawRecord, InstanceRecord, MeshPassType, ObjectDataRecord};

/// Capacity to grow to when `required` records no longer fit in `current`.
pub(crate) fn next_capacity(current: u32, required: u32) -> u32 {
    required.max(current.saturating_mul(2)).max(1)
}

/// A GPU buffer of fixed-size records that is recreated larger when a write
/// does not fit. Contents are not preserved across a grow.
pub(crate) struct GrowableBuffer {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) capacity: u32,
    label: String,
    usage: wgpu::BufferUsages,
    stride: u64,
}

impl GrowableBuffer {
    pub(crate) fn new<T>(
        device: &wgpu::Device,
        label: String,
        usage: wgpu::BufferUsages,
        capacity: u32,
    ) -> Self {
        let stride = mem::size_of::<T>() as u64;
        let capacity = capacity.max(1);
        let buffer = create_buffer(device, &label, usage, stride, capacity);

        Self {
            buffer,
            capacity,
            label,
            usage,
            stride,
        }
    }

    /// Makes room for `required` records. Returns true when the buffer was
    /// recreated.
    pub(crate) fn reserve(&mut self, device: &wgpu::Device, required: u32) -> bool {
        if required <= self.capacity {
            return false;
        }

        let new_capacity = next_capacity(self.capacity, required);
        log::info!(
            "Growing {}: {} -> {}",
            self.label,
            self.capacity,
            new_capacity
        );

        self.buffer = create_buffer(device, &self.label, self.usage, self.stride, new_capacity);
        self.capacity = new_capacity;
        true
    }

    pub(crate) fn offset_of(&self, index: u32) -> wgpu::BufferAddress {
        u64::from(index) * self.stride
    }

    pub(crate) fn byte_len(&self, records: u32) -> wgpu::BufferAddress {
        self.offset_of(records)
    }
}

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    usage: wgpu::BufferUsages,
    stride: u64,
    capacity: u32,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: stride * u64::from(capacity),
        usage,
        mapped_at_creation: false,
    })
}

/// GPU buffers owned by one mesh pass.
pub(crate) struct PassBuffers {
    /// Draw commands with zero instance counts, written from the CPU.
    pub(crate) clear_indirect: GrowableBuffer,
    /// Copy of `clear_indirect` the cull stage fills in and draws from.
    pub(crate) draw_indirect: GrowableBuffer,
    pub(crate) instances: GrowableBuffer,
    pub(crate) compacted_instances: GrowableBuffer,
    pub(crate) indirect_len: u32,
    pub(crate) instance_len: u32,
    scratch_indirect: Vec<IndirectDrawRecord>,
    scratch_instances: Vec<InstanceRecord>,
}

impl PassBuffers {
    pub(crate) fn new(
        device: &wgpu::Device,
        kind: MeshPassType,
        indirect_capacity: u32,
        instance_capacity: u32,
    ) -> Self {
        let name = kind.label();

        Self {
            clear_indirect: GrowableBuffer::new::<IndirectDrawRecord>(
                device,
                format!("{name} clear indirect buffer"),
                wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                indirect_capacity,
            ),
            draw_indirect: GrowableBuffer::new::<IndirectDrawRecord>(
                device,
                format!("{name} draw indirect buffer"),
                wgpu::BufferUsages::INDIRECT
                    | wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST,
                indirect_capacity,
            ),
            instances: GrowableBuffer::new::<InstanceRecord>(
                device,
                format!("{name} instance buffer"),
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                instance_capacity,
            ),
            compacted_instances: GrowableBuffer::new::<u32>(
                device,
                format!("{name} compacted instance buffer"),
                wgpu::BufferUsages::STORAGE,
                instance_capacity,
            ),
            indirect_len: 0,
            instance_len: 0,
            scratch_indirect: Vec::new(),
            scratch_instances: Vec::new(),
        }
    }

    /// Resizes the indirect scratch to `len` zeroed records and returns it
    /// for filling. The GPU buffers are grown to match.
    pub(crate) fn begin_indirect(
        &mut self,
        device: &wgpu::Device,
        len: u32,
    ) -> &mut [IndirectDrawRecord] {
        self.clear_indirect.reserve(device, len);
        self.draw_indirect.reserve(device, len);
        self.indirect_len = len;

        self.scratch_indirect.clear();
        self.scratch_indirect
            .resize(len as usize, bytemuck::Zeroable::zeroed());
        &mut self.scratch_indirect
    }

    pub(crate) fn begin_instances(
        &mut self,
        device: &wgpu::Device,
        len: u32,
    ) -> &mut [InstanceRecord] {
        self.instances.reserve(device, len);
        self.compacted_instances.reserve(device, len);
        self.instance_len = len;

        self.scratch_instances.clear();
        self.scratch_instances
            .resize(len as usize, bytemuck::Zeroable::zeroed());
        &mut self.scratch_instances
    }

    pub(crate) fn flush_indirect(&self, queue: &wgpu::Queue) {
        if !self.scratch_indirect.is_empty() {
            queue.write_buffer(
                &self.clear_indirect.buffer,
                0,
                bytemuck::cast_slice(&self.scratch_indirect),
            );
        }
    }

    pub(crate) fn flush_instances(&self, queue: &wgpu::Queue) {
        if !self.scratch_instances.is_empty() {
            queue.write_buffer(
                &self.instances.buffer,
                0,
                bytemuck::cast_slice(&self.scratch_instances),
            );
        }
    }
}

/// Per-object model matrices and bounds, shared by every pass.
pub(crate) struct ObjectBuffer {
    pub(crate) data: GrowableBuffer,
    pub(crate) bind_group: wgpu::BindGroup,
    pub(crate) bind_layout: wgpu::BindGroupLayout,
    pub(crate) scratch: Vec<ObjectDataRecord>,
}

impl ObjectBuffer {
    pub(crate) fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ObjectDataBindLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let data = GrowableBuffer::new::<ObjectDataRecord>(
            device,
            "object data buffer".to_string(),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            capacity,
        );
        let bind_group = create_object_bind_group(device, &bind_layout, &data.buffer);

        Self {
            data,
            bind_group,
            bind_layout,
            scratch: Vec::with_capacity(capacity as usize),
        }
    }

    /// Grows the buffer for `required` objects, rebuilding the bind group.
    /// Returns true when the old contents were lost.
    pub(crate) fn reserve(&mut self, device: &wgpu::Device, required: u32) -> bool {
        if !self.data.reserve(device, required) {
            return false;
        }

        self.bind_group = create_object_bind_group(device, &self.bind_layout, &self.data.buffer);
        true
    }
}

fn create_object_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ObjectDataBindGroup"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

/// Shared vertex and index buffers every merged mesh is copied into.
pub(crate) struct MergedGeometry {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) vertex_stride: u64,
}

impl MergedGeometry {
    pub(crate) fn new(
        device: &wgpu::Device,
        vertex_stride: u64,
        total_vertices: u64,
        total_indices: u64,
    ) -> Self {
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("MergedVertexBuffer"),
            size: (vertex_stride * total_vertices).max(4),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("MergedIndexBuffer"),
            size: (mem::size_of::<u32>() as u64 * total_indices).max(4),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            vertex_buffer,
            index_buffer,
            vertex_stride,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_doubles_until_it_fits() {
        assert_eq!(next_capacity(256, 257), 512);
        assert_eq!(next_capacity(256, 1000), 1000);
        assert_eq!(next_capacity(0, 0), 1);
        assert_eq!(next_capacity(u32::MAX / 2 + 1, u32::MAX), u32::MAX);
    }
}
