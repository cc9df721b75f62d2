use std::mem;

use crate::asset::MeshGeometry;
use crate::renderer::internal::{MergedGeometry, ObjectBuffer, PassBuffers};
use crate::renderer::MeshPassType;
use crate::scene::{MergeLayout, RenderScene};

const INDEX_SIZE: u64 = mem::size_of::<u32>() as u64;

impl RenderScene {
    /// Writes the batch output of the last [`RenderScene::build_batches`] to
    /// the GPU. Passes are only rewritten when their refresh flags are set;
    /// object data is written for the dirty objects, or whole once the dirty
    /// share passes `full_upload_ratio` or dirty objects were cleared without
    /// an upload. The dirty set is empty afterwards.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        for kind in MeshPassType::ALL {
            self.upload_pass(kind, device, queue);
        }
        self.upload_objects(device, queue);
    }

    fn upload_pass(&mut self, kind: MeshPassType, device: &wgpu::Device, queue: &wgpu::Queue) {
        let pass = &mut self.passes[kind];
        if !pass.needs_indirect_refresh && !pass.needs_instance_refresh {
            return;
        }

        let indirect_len = pass.batches.len() as u32;
        let instance_len = pass.flat_batches.len() as u32;
        let refresh_indirect = pass.needs_indirect_refresh;
        let refresh_instances = pass.needs_instance_refresh;

        let mut gpu = pass.gpu.take().unwrap_or_else(|| {
            PassBuffers::new(
                device,
                kind,
                self.settings.initial_indirect_capacity,
                self.settings.initial_instance_capacity,
            )
        });

        if refresh_indirect {
            let records = gpu.begin_indirect(device, indirect_len);
            self.fill_indirect_array(kind, records);
            gpu.flush_indirect(queue);
        }
        if refresh_instances {
            let records = gpu.begin_instances(device, instance_len);
            self.fill_instances_array(kind, records);
            gpu.flush_instances(queue);
        }

        let pass = &mut self.passes[kind];
        pass.gpu = Some(gpu);
        pass.needs_indirect_refresh = false;
        pass.needs_instance_refresh = false;

        log::debug!(
            "{} pass: uploaded {} draw commands, {} instances",
            kind.label(),
            indirect_len,
            instance_len
        );
    }

    fn upload_objects(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let count = self.renderables.len() as u32;

        let (mut objects, created) = match self.object_buffer.take() {
            Some(objects) => (objects, false),
            None => (
                ObjectBuffer::new(device, self.settings.initial_object_capacity),
                true,
            ),
        };
        let regrown = objects.reserve(device, count);

        let dirty = self.dirty.len();
        let full = created || regrown || self.wants_full_object_upload();

        if full {
            objects.scratch.clear();
            objects
                .scratch
                .resize(count as usize, bytemuck::Zeroable::zeroed());
            self.fill_object_data(&mut objects.scratch);
            if !objects.scratch.is_empty() {
                queue.write_buffer(&objects.data.buffer, 0, bytemuck::cast_slice(&objects.scratch));
            }
            log::debug!("Uploaded all {} objects", count);
        } else {
            for &handle in self.dirty.as_slice() {
                let record = self.write_object(handle);
                queue.write_buffer(
                    &objects.data.buffer,
                    objects.data.offset_of(handle.raw()),
                    bytemuck::bytes_of(&record),
                );
            }
            log::debug!("Uploaded {} dirty objects of {}", dirty, count);
        }

        self.object_buffer = Some(objects);
        self.object_data_stale = false;
        self.reset_dirty();
    }

    /// Whether the existing object buffer must be rewritten whole: too many
    /// objects are dirty, or dirty objects were cleared without an upload.
    pub(crate) fn wants_full_object_upload(&self) -> bool {
        self.object_data_stale
            || self.dirty.len() as f32
                > self.settings.full_upload_ratio * self.renderables.len() as f32
    }

    /// Resets the draw-indirect buffer of `kind` from its clear template so
    /// the cull stage starts from zero instance counts.
    pub fn ready_cull_data(&self, kind: MeshPassType, encoder: &mut wgpu::CommandEncoder) {
        let Some(gpu) = &self.passes[kind].gpu else {
            return;
        };
        if gpu.indirect_len == 0 {
            return;
        }

        encoder.copy_buffer_to_buffer(
            &gpu.clear_indirect.buffer,
            0,
            &gpu.draw_indirect.buffer,
            0,
            gpu.clear_indirect.byte_len(gpu.indirect_len),
        );
    }

    /// Merges every registered mesh and copies its GPU geometry into the
    /// shared buffers. Meshes without buffers, or whose vertex stride differs
    /// from `vertex_stride`, are left unmerged and keep drawing from their
    /// own buffers.
    pub fn upload_merged_geometry(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        vertex_stride: u64,
    ) -> MergeLayout {
        let layout = self.merge_meshes_where(|mesh| {
            match gpu_merge_conflict(&mesh.original, vertex_stride) {
                Some(reason) => {
                    log::warn!("Mesh '{}' {}, not merging it", mesh.original.label, reason);
                    false
                }
                None => true,
            }
        });
        let merged = MergedGeometry::new(
            device,
            vertex_stride,
            layout.total_vertices,
            layout.total_indices,
        );

        for mesh in self.meshes.items().as_slice() {
            let Some(buffers) = mesh.original.buffers.as_ref().filter(|_| mesh.is_merged) else {
                continue;
            };

            if mesh.vertex_count > 0 {
                encoder.copy_buffer_to_buffer(
                    &buffers.vertex,
                    0,
                    &merged.vertex_buffer,
                    u64::from(mesh.first_vertex) * vertex_stride,
                    u64::from(mesh.vertex_count) * vertex_stride,
                );
            }
            if mesh.index_count > 0 {
                encoder.copy_buffer_to_buffer(
                    &buffers.index,
                    0,
                    &merged.index_buffer,
                    u64::from(mesh.first_index) * INDEX_SIZE,
                    u64::from(mesh.index_count) * INDEX_SIZE,
                );
            }
        }

        self.merged_geometry = Some(merged);
        layout
    }

    pub fn merged_vertex_buffer(&self) -> Option<&wgpu::Buffer> {
        self.merged_geometry.as_ref().map(|merged| &merged.vertex_buffer)
    }

    pub fn merged_index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.merged_geometry.as_ref().map(|merged| &merged.index_buffer)
    }

    pub fn merged_vertex_stride(&self) -> Option<u64> {
        self.merged_geometry.as_ref().map(|merged| merged.vertex_stride)
    }

    pub fn object_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.object_buffer.as_ref().map(|objects| &objects.bind_group)
    }

    pub fn object_bind_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.object_buffer.as_ref().map(|objects| &objects.bind_layout)
    }

    /// Buffer to issue `multi_draw_indexed_indirect` from for `kind`.
    pub fn draw_indirect_buffer(&self, kind: MeshPassType) -> Option<&wgpu::Buffer> {
        self.passes[kind]
            .gpu
            .as_ref()
            .map(|gpu| &gpu.draw_indirect.buffer)
    }

    pub fn instance_buffer(&self, kind: MeshPassType) -> Option<&wgpu::Buffer> {
        self.passes[kind].gpu.as_ref().map(|gpu| &gpu.instances.buffer)
    }

    pub fn compacted_instance_buffer(&self, kind: MeshPassType) -> Option<&wgpu::Buffer> {
        self.passes[kind]
            .gpu
            .as_ref()
            .map(|gpu| &gpu.compacted_instances.buffer)
    }
}

/// Why `geometry` cannot be copied into merged buffers with `vertex_stride`.
fn gpu_merge_conflict(geometry: &MeshGeometry, vertex_stride: u64) -> Option<String> {
    match &geometry.buffers {
        None => Some("has no GPU buffers".to_string()),
        Some(buffers) if buffers.vertex_stride != vertex_stride => Some(format!(
            "has vertex stride {} but merged geometry uses {}",
            buffers.vertex_stride, vertex_stride
        )),
        Some(_) => None,
    }
}
