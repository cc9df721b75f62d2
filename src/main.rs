use std::sync::Arc;

use glam::{Mat4, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use indirect_batcher::{
    BatchSettings, DrawPassFlags, Handle, Material, MeshGeometry, MeshObject, MeshPassType,
    PassMaterial, RenderBounds, RenderObject, RenderScene,
};

const SEED: u64 = 0x5eed;
const INITIAL_OBJECTS: usize = 2_000;
const FRAMES: usize = 8;
const CHANGES_PER_FRAME: usize = 200;

fn build_meshes() -> Vec<Arc<MeshGeometry>> {
    [("cube", 24, 36), ("sphere", 559, 2880), ("quad", 4, 6), ("cone", 66, 192)]
        .into_iter()
        .map(|(label, vertices, indices)| {
            Arc::new(
                MeshGeometry::new(label, vertices, indices)
                    .with_bounds(RenderBounds::from_box(Vec3::ZERO, Vec3::ONE)),
            )
        })
        .collect()
}

fn build_materials() -> Vec<Arc<Material>> {
    vec![
        Arc::new(
            Material::new("stone")
                .with_pass(MeshPassType::Forward, PassMaterial::new(1, 10))
                .with_pass(MeshPassType::DirectionalShadow, PassMaterial::new(0, 20)),
        ),
        Arc::new(
            Material::new("metal")
                .with_pass(MeshPassType::Forward, PassMaterial::new(2, 10))
                .with_pass(MeshPassType::DirectionalShadow, PassMaterial::new(0, 20)),
        ),
        Arc::new(
            Material::new("glass").with_pass(MeshPassType::Transparency, PassMaterial::new(3, 11)),
        ),
    ]
}

fn random_object(
    rng: &mut SmallRng,
    meshes: &[Arc<MeshGeometry>],
    materials: &[Arc<Material>],
) -> MeshObject {
    let mesh = meshes[rng.gen_range(0..meshes.len())].clone();
    let material = materials[rng.gen_range(0..materials.len())].clone();
    let position = Vec3::new(
        rng.gen_range(-100.0..100.0),
        0.0,
        rng.gen_range(-100.0..100.0),
    );
    let passes = if rng.gen_bool(0.1) {
        DrawPassFlags::FORWARD
    } else {
        DrawPassFlags::default()
    };

    MeshObject::new(mesh, material)
        .with_transform(Mat4::from_translation(position))
        .with_draw_passes(passes)
}

fn main() {
    indirect_batcher::init_logging();

    let settings = BatchSettings::load();
    let mut scene = RenderScene::new(settings);
    let mut rng = SmallRng::seed_from_u64(SEED);
    let meshes = build_meshes();
    let materials = build_materials();

    let descriptions: Vec<MeshObject> = (0..INITIAL_OBJECTS)
        .map(|_| random_object(&mut rng, &meshes, &materials))
        .collect();
    let mut live: Vec<Handle<RenderObject>> = scene.register_object_batch(&descriptions);
    scene.merge_meshes();

    for frame in 0..FRAMES {
        for _ in 0..CHANGES_PER_FRAME {
            match rng.gen_range(0..4) {
                0 => {
                    let handle = scene.register_object(&random_object(&mut rng, &meshes, &materials));
                    live.push(handle);
                }
                1 if !live.is_empty() => {
                    let handle = live.swap_remove(rng.gen_range(0..live.len()));
                    scene.unregister_object(handle);
                }
                2 if !live.is_empty() => {
                    let handle = live[rng.gen_range(0..live.len())];
                    let material = &materials[rng.gen_range(0..materials.len())];
                    scene.update_material(handle, material);
                }
                _ if !live.is_empty() => {
                    let handle = live[rng.gen_range(0..live.len())];
                    let offset = Vec3::new(rng.gen_range(-1.0..1.0), 0.0, rng.gen_range(-1.0..1.0));
                    let transform = scene.get_object(handle).transform;
                    scene.update_transform(handle, Mat4::from_translation(offset) * transform);
                }
                _ => {}
            }
        }

        let stats = scene.build_batches();
        log::info!(
            "Frame {}: {} live objects, {} dirty, {} draw calls in {:?}",
            frame,
            live.len(),
            scene.dirty_objects().len(),
            stats.draw_calls(),
            stats.elapsed
        );
        for (kind, pass) in stats.passes.iter() {
            log::info!(
                "  {:<17} {:>5} instances {:>3} indirect {:>3} multi",
                kind.label(),
                pass.flat_batches,
                pass.indirect_batches,
                pass.multibatches
            );
        }

        scene.clear_dirty_objects();
    }
}
