use std::sync::Arc;

use bytemuck::Zeroable;
use indirect_batcher::renderer::IndirectBatch;
use indirect_batcher::{
    BatchSettings, DrawPassFlags, IndirectDrawRecord, InstanceRecord, Material, MeshGeometry,
    MeshObject, MeshPassType, PassMaterial, RenderScene,
};

const FORWARD: MeshPassType = MeshPassType::Forward;

fn scene() -> RenderScene {
    indirect_batcher::init_logging();
    RenderScene::new(BatchSettings {
        parallel_passes: false,
        ..BatchSettings::default()
    })
}

fn forward_material(name: &str, set: u64) -> Arc<Material> {
    Arc::new(Material::new(name).with_pass(FORWARD, PassMaterial::new(set, 1)))
}

fn mesh(label: &str) -> Arc<MeshGeometry> {
    Arc::new(MeshGeometry::new(label, 8, 12))
}

fn batch_for(scene: &RenderScene, mesh: &Arc<MeshGeometry>) -> Option<IndirectBatch> {
    let handle = scene.meshes().iter().position(|m| Arc::ptr_eq(&m.original, mesh))?;
    scene
        .mesh_pass(FORWARD)
        .batches()
        .iter()
        .copied()
        .find(|batch| batch.mesh.idx() == handle)
}

#[test]
fn objects_group_by_mesh_and_material() {
    let mut scene = scene();
    let (m1, m2) = (mesh("m1"), mesh("m2"));
    let (x, y) = (forward_material("x", 1), forward_material("y", 2));

    scene.register_object(&MeshObject::new(m1.clone(), x.clone()));
    scene.register_object(&MeshObject::new(m1.clone(), x.clone()));
    scene.register_object(&MeshObject::new(m2.clone(), y.clone()));
    scene.merge_meshes();
    scene.build_batches();

    let forward = scene.mesh_pass(FORWARD);
    assert_eq!(forward.batches().len(), 2);
    let m1_batch = batch_for(&scene, &m1).unwrap();
    let m2_batch = batch_for(&scene, &m2).unwrap();
    assert_eq!((m1_batch.count, m1_batch.material), (2, PassMaterial::new(1, 1)));
    assert_eq!((m2_batch.count, m2_batch.material), (1, PassMaterial::new(2, 1)));

    // Both meshes are merged but the materials differ.
    assert_eq!(forward.multibatches().len(), 2);

    scene.register_object(&MeshObject::new(m2.clone(), y));
    scene.build_batches();

    let after_m1 = batch_for(&scene, &m1).unwrap();
    assert_eq!(batch_for(&scene, &m2).unwrap().count, 2);
    assert_eq!((after_m1.count, after_m1.material), (m1_batch.count, m1_batch.material));
    assert_eq!(scene.mesh_pass(FORWARD).batches().len(), 2);
}

#[test]
fn deleting_a_sole_object_removes_its_batch() {
    let mut scene = scene();
    let material = forward_material("x", 1);
    let (kept, lone) = (mesh("kept"), mesh("lone"));

    scene.register_object(&MeshObject::new(kept.clone(), material.clone()));
    let lone_object = scene.register_object(&MeshObject::new(lone.clone(), material));
    scene.build_batches();

    // Unmerged meshes never share a multibatch.
    assert_eq!(scene.mesh_pass(FORWARD).batches().len(), 2);
    assert_eq!(scene.mesh_pass(FORWARD).multibatches().len(), 2);
    let kept_before = batch_for(&scene, &kept).unwrap();

    scene.unregister_object(lone_object);
    scene.build_batches();

    let forward = scene.mesh_pass(FORWARD);
    assert_eq!(forward.batches().len(), 1);
    assert_eq!(forward.multibatches().len(), 1);
    assert!(batch_for(&scene, &lone).is_none());
    assert_eq!(batch_for(&scene, &kept).unwrap().count, kept_before.count);
    assert_eq!(scene.get_object(lone_object).pass_index(FORWARD), None);
}

#[test]
fn merged_meshes_with_one_material_share_a_multibatch() {
    let mut scene = scene();
    let material = forward_material("x", 1);
    for label in ["a", "b", "c"] {
        scene.register_object(&MeshObject::new(mesh(label), material.clone()));
    }
    scene.merge_meshes();
    scene.build_batches();

    let forward = scene.mesh_pass(FORWARD);
    assert_eq!(forward.batches().len(), 3);
    assert_eq!(forward.multibatches().len(), 1);
    assert_eq!(forward.multibatches()[0].count, 3);

    // A mesh registered after the merge stays out of the shared run.
    scene.register_object(&MeshObject::new(mesh("late"), material));
    scene.build_batches();
    let multibatched: u32 = scene
        .mesh_pass(FORWARD)
        .multibatches()
        .iter()
        .map(|multibatch| multibatch.count)
        .sum();
    assert_eq!(multibatched, 4);
    assert!(scene.mesh_pass(FORWARD).multibatches().len() >= 2);
}

#[test]
fn material_without_a_pass_shader_is_excluded() {
    let mut scene = scene();
    let shadow_only = Arc::new(
        Material::new("caster")
            .with_pass(MeshPassType::DirectionalShadow, PassMaterial::new(0, 7)),
    );
    let handle = scene.register_object(&MeshObject::new(mesh("rock"), shadow_only));
    let stats = scene.build_batches();

    assert_eq!(stats.passes[FORWARD].flat_batches, 0);
    assert_eq!(stats.passes[MeshPassType::Transparency].flat_batches, 0);
    assert_eq!(stats.passes[MeshPassType::DirectionalShadow].flat_batches, 1);
    assert!(scene.get_object(handle).pass_index(FORWARD).is_none());
}

#[test]
fn transparent_materials_go_to_the_transparency_pass() {
    let mut scene = scene();
    let glass = Arc::new(
        Material::new("glass").with_pass(MeshPassType::Transparency, PassMaterial::new(4, 2)),
    );
    let handle = scene.register_object(
        &MeshObject::new(mesh("pane"), glass).with_draw_passes(DrawPassFlags::FORWARD),
    );
    scene.build_batches();

    let object = scene.get_object(handle);
    assert!(object.pass_index(MeshPassType::Transparency).is_some());
    assert!(object.pass_index(FORWARD).is_none());
    assert!(object.pass_index(MeshPassType::DirectionalShadow).is_none());
}

#[test]
fn custom_sort_key_orders_the_flat_list() {
    let mut scene = scene();
    let material = forward_material("x", 1);
    let last = scene.register_object(&MeshObject::new(mesh("a"), material.clone()).with_sort_key(9));
    let first = scene.register_object(&MeshObject::new(mesh("b"), material).with_sort_key(1));
    scene.build_batches();

    let forward = scene.mesh_pass(FORWARD);
    let order: Vec<_> = forward
        .flat_batches()
        .iter()
        .map(|entry| forward.get(entry.object).original)
        .collect();
    assert_eq!(order, vec![first, last]);
}

#[test]
fn empty_scene_builds_nothing() {
    let mut scene = scene();
    let stats = scene.build_batches();

    for kind in MeshPassType::ALL {
        let pass = scene.mesh_pass(kind);
        assert!(pass.flat_batches().is_empty());
        assert!(pass.batches().is_empty());
        assert!(pass.multibatches().is_empty());
    }
    assert_eq!(stats.draw_calls(), 0);
}

#[test]
fn transform_update_requeues_and_marks_dirty() {
    let mut scene = scene();
    let handle = scene.register_object(&MeshObject::new(mesh("a"), forward_material("x", 1)));
    scene.build_batches();
    scene.clear_dirty_objects();

    scene.update_transform(handle, glam::Mat4::from_scale(glam::Vec3::splat(2.0)));
    assert_eq!(scene.dirty_objects(), &[handle]);
    assert_eq!(scene.mesh_pass(FORWARD).unbatched_objects(), &[handle]);
    assert_eq!(scene.mesh_pass(FORWARD).objects_to_delete().len(), 1);

    scene.build_batches();
    let forward = scene.mesh_pass(FORWARD);
    assert_eq!(forward.flat_batches().len(), 1);
    assert!(scene.get_object(handle).pass_index(FORWARD).is_some());
    assert_eq!(
        scene.write_object(handle).model,
        glam::Mat4::from_scale(glam::Vec3::splat(2.0)).to_cols_array_2d()
    );
}

#[test]
fn fill_routines_cover_every_batch_and_instance() {
    let mut scene = scene();
    let (m1, m2) = (mesh("m1"), mesh("m2"));
    let material = forward_material("x", 1);
    for m in [&m1, &m1, &m2, &m1] {
        scene.register_object(&MeshObject::new(m.clone(), material.clone()));
    }
    scene.merge_meshes();
    scene.build_batches();

    let forward = scene.mesh_pass(FORWARD);
    let mut draws = vec![IndirectDrawRecord::zeroed(); forward.batches().len()];
    let mut instances = vec![InstanceRecord::zeroed(); forward.flat_batches().len()];
    scene.fill_indirect_array(FORWARD, &mut draws);
    scene.fill_instances_array(FORWARD, &mut instances);

    let total: u32 = forward.batches().iter().map(|batch| batch.count).sum();
    assert_eq!(total as usize, instances.len());
    for (batch_id, draw) in draws.iter().enumerate() {
        let batch = forward.batches()[batch_id];
        let members = instances
            .iter()
            .filter(|instance| instance.batch_id == batch_id as u32)
            .count();
        assert_eq!(members as u32, batch.count);
        assert_eq!(draw.first_instance, batch.first);
        assert_eq!(draw.index_count, 12);
    }
}
