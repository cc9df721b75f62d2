use std::time::Duration;

use instant::Instant;
use rayon::prelude::*;

use crate::asset::Handle;
use crate::renderer::internal::batches::{refresh_pass, PassAssignment, SceneLookup};
use crate::renderer::{
    IndirectDrawRecord, InstanceRecord, MeshPass, MeshPassType, ObjectDataRecord, PerPass,
};
use crate::scene::{RenderObject, RenderScene};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub live_objects: usize,
    pub flat_batches: usize,
    pub indirect_batches: usize,
    pub multibatches: usize,
}

impl PassStats {
    fn of(pass: &MeshPass) -> Self {
        Self {
            live_objects: pass.live_object_count(),
            flat_batches: pass.flat_batches.len(),
            indirect_batches: pass.batches.len(),
            multibatches: pass.multibatches.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameBatchStats {
    pub passes: PerPass<PassStats>,
    pub elapsed: Duration,
}

impl FrameBatchStats {
    pub fn draw_calls(&self) -> usize {
        self.passes.iter().map(|(_, stats)| stats.multibatches).sum()
    }
}

impl RenderScene {
    /// Refreshes every mesh pass. Passes share no mutable state, so they are
    /// rebuilt concurrently when `parallel_passes` is set; per-pass index
    /// updates on the render objects are applied after all of them finish.
    pub fn build_batches(&mut self) -> FrameBatchStats {
        let start = Instant::now();

        let lookup = SceneLookup {
            renderables: &self.renderables,
            materials: self.materials.items(),
            meshes: self.meshes.items(),
        };
        let passes = self.passes.as_mut_slice();

        let assignments: Vec<Vec<PassAssignment>> = if self.settings.parallel_passes {
            let mut refresh = || -> Vec<Vec<PassAssignment>> {
                passes
                    .par_iter_mut()
                    .map(|pass| refresh_pass(pass, &lookup))
                    .collect()
            };
            match &self.pool {
                Some(pool) => pool.install(refresh),
                None => refresh(),
            }
        } else {
            passes
                .iter_mut()
                .map(|pass| refresh_pass(pass, &lookup))
                .collect()
        };

        for (kind, pass_assignments) in MeshPassType::ALL.into_iter().zip(assignments) {
            for assignment in pass_assignments {
                self.renderables[assignment.object.idx()].pass_indices[kind] =
                    Some(assignment.pass_object);
            }
        }

        let stats = FrameBatchStats {
            passes: PerPass::from_fn(|kind| PassStats::of(&self.passes[kind])),
            elapsed: start.elapsed(),
        };

        for (kind, pass) in stats.passes.iter() {
            log::debug!(
                "{} pass: {} objects, {} flat, {} indirect, {} multi",
                kind.label(),
                pass.live_objects,
                pass.flat_batches,
                pass.indirect_batches,
                pass.multibatches
            );
        }
        log::debug!("Built batches in {:?}", stats.elapsed);

        stats
    }

    /// Writes one draw command per indirect batch of `kind` into `out`.
    /// Instance counts are left at zero for the cull stage to fill.
    pub fn fill_indirect_array(&self, kind: MeshPassType, out: &mut [IndirectDrawRecord]) {
        let pass = &self.passes[kind];
        assert!(
            out.len() >= pass.batches.len(),
            "{} pass: indirect region holds {} records, {} needed",
            kind.label(),
            out.len(),
            pass.batches.len()
        );

        for (index, (batch, record)) in pass.batches.iter().zip(out.iter_mut()).enumerate() {
            *record = IndirectDrawRecord::new(&self.meshes[batch.mesh], batch.first, index as u32);
        }
    }

    /// Writes one record per flat batch entry, in sorted order, naming the
    /// render object and the indirect batch it belongs to.
    pub fn fill_instances_array(&self, kind: MeshPassType, out: &mut [InstanceRecord]) {
        let pass = &self.passes[kind];
        assert!(
            out.len() >= pass.flat_batches.len(),
            "{} pass: instance region holds {} records, {} needed",
            kind.label(),
            out.len(),
            pass.flat_batches.len()
        );

        let mut records = out.iter_mut();
        for (batch_id, batch) in pass.batches.iter().enumerate() {
            let first = batch.first as usize;
            let run = &pass.flat_batches[first..first + batch.count as usize];

            for (entry, record) in run.iter().zip(records.by_ref()) {
                *record = InstanceRecord {
                    object_id: pass.get(entry.object).original.raw(),
                    batch_id: batch_id as u32,
                };
            }
        }
    }

    /// Writes the model matrix and bounds of every render object.
    pub fn fill_object_data(&self, out: &mut [ObjectDataRecord]) {
        assert!(
            out.len() >= self.renderables.len(),
            "object region holds {} records, {} needed",
            out.len(),
            self.renderables.len()
        );

        for (object, record) in self.renderables.iter().zip(out.iter_mut()) {
            *record = ObjectDataRecord::new(object.transform, &object.bounds);
        }
    }

    pub fn write_object(&self, handle: Handle<RenderObject>) -> ObjectDataRecord {
        let object = self.get_object(handle);
        ObjectDataRecord::new(object.transform, &object.bounds)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytemuck::Zeroable;
    use glam::{Mat4, Vec3};

    use crate::asset::{Material, MeshGeometry, PassMaterial, RenderBounds};
    use crate::scene::MeshObject;
    use crate::settings::BatchSettings;

    use super::*;

    fn scene_with_two_meshes() -> (RenderScene, Vec<Handle<RenderObject>>) {
        let mut scene = RenderScene::new(BatchSettings {
            parallel_passes: false,
            ..BatchSettings::default()
        });
        let material = Arc::new(
            Material::new("lit").with_pass(MeshPassType::Forward, PassMaterial::new(1, 1)),
        );
        let cube = Arc::new(MeshGeometry::new("cube", 24, 36));
        let quad = Arc::new(MeshGeometry::new("quad", 4, 6));

        let handles = vec![
            scene.register_object(&MeshObject::new(cube.clone(), material.clone())),
            scene.register_object(&MeshObject::new(quad, material.clone())),
            scene.register_object(&MeshObject::new(cube, material)),
        ];
        scene.merge_meshes();
        scene.build_batches();
        (scene, handles)
    }

    #[test]
    fn indirect_records_describe_each_batch() {
        let (scene, _) = scene_with_two_meshes();
        let pass = scene.mesh_pass(MeshPassType::Forward);
        let mut records = vec![IndirectDrawRecord::zeroed(); pass.batches().len()];

        scene.fill_indirect_array(MeshPassType::Forward, &mut records);

        assert_eq!(records.len(), 2);
        for (index, (record, batch)) in records.iter().zip(pass.batches()).enumerate() {
            let mesh = scene.get_mesh(batch.mesh);
            assert_eq!(record.index_count, mesh.index_count);
            assert_eq!(record.first_index, mesh.first_index);
            assert_eq!(record.vertex_offset, mesh.first_vertex as i32);
            assert_eq!(record.first_instance, batch.first);
            assert_eq!(record.instance_count, 0);
            assert_eq!(record.batch_id, index as u32);
        }
    }

    #[test]
    fn instance_records_follow_flat_order() {
        let (scene, handles) = scene_with_two_meshes();
        let pass = scene.mesh_pass(MeshPassType::Forward);
        let mut records = vec![InstanceRecord::zeroed(); pass.flat_batches().len()];

        scene.fill_instances_array(MeshPassType::Forward, &mut records);

        let mut seen: Vec<u32> = records.iter().map(|record| record.object_id).collect();
        seen.sort_unstable();
        assert_eq!(seen, handles.iter().map(|h| h.raw()).collect::<Vec<_>>());

        for record in &records {
            let batch = pass.batches()[record.batch_id as usize];
            let object = scene.get_object(Handle::new(record.object_id));
            assert_eq!(object.mesh, batch.mesh);
        }
    }

    #[test]
    #[should_panic(expected = "indirect region holds")]
    fn undersized_indirect_region_panics() {
        let (scene, _) = scene_with_two_meshes();
        let mut records = vec![IndirectDrawRecord::zeroed(); 1];
        scene.fill_indirect_array(MeshPassType::Forward, &mut records);
    }

    #[test]
    fn object_data_matches_transforms() {
        let (mut scene, handles) = scene_with_two_meshes();
        let moved = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
        scene.update_transform(handles[1], moved);

        let mut records = vec![ObjectDataRecord::zeroed(); scene.object_count()];
        scene.fill_object_data(&mut records);

        assert_eq!(records[1].model, moved.to_cols_array_2d());
        assert_eq!(records[1], scene.write_object(handles[1]));
        assert_eq!(
            records[0].extents_valid[3],
            if RenderBounds::default().valid { 1.0 } else { 0.0 }
        );
    }

    #[test]
    fn default_settings_build_on_the_global_pool() {
        let mut scene = RenderScene::default();
        assert!(scene.settings().parallel_passes);
        assert!(scene.pool.is_none());

        let material = Arc::new(
            Material::new("lit").with_pass(MeshPassType::Forward, PassMaterial::new(1, 1)),
        );
        let mesh = Arc::new(MeshGeometry::new("cube", 24, 36));
        let handle = scene.register_object(&MeshObject::new(mesh, material));
        let stats = scene.build_batches();

        assert_eq!(stats.passes[MeshPassType::Forward].flat_batches, 1);
        assert!(scene
            .get_object(handle)
            .pass_index(MeshPassType::Forward)
            .is_some());

        let (sequential, _) = scene_with_two_meshes();
        let mut parallel = RenderScene::default();
        for object in sequential.objects() {
            let mesh = Arc::clone(&sequential.get_mesh(object.mesh).original);
            let material = Arc::new(sequential.get_material(object.material).clone());
            parallel.register_object(&MeshObject::new(mesh, material));
        }
        parallel.merge_meshes();
        parallel.build_batches();

        let (a, b) = (
            sequential.mesh_pass(MeshPassType::Forward),
            parallel.mesh_pass(MeshPassType::Forward),
        );
        assert_eq!(a.flat_batches().len(), b.flat_batches().len());
        assert_eq!(a.batches().len(), b.batches().len());
        assert_eq!(a.multibatches(), b.multibatches());
    }

    #[test]
    fn stats_count_draw_calls() {
        let (mut scene, _) = scene_with_two_meshes();
        let stats = scene.build_batches();

        let forward = stats.passes[MeshPassType::Forward];
        assert_eq!(forward.live_objects, 3);
        assert_eq!(forward.flat_batches, 3);
        assert_eq!(forward.indirect_batches, 2);
        // Both meshes are merged and share the material.
        assert_eq!(stats.draw_calls(), 1);
    }
}
