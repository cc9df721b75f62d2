use std::sync::Arc;

use glam::Mat4;

use crate::asset::{identity_of, DrawMesh, Handle, HandleRegistry, Material, MeshGeometry};
use crate::renderer::internal::{MergedGeometry, ObjectBuffer};
use crate::renderer::{MeshPass, MeshPassType, PerPass};
use crate::scene::dirty::DirtyTracker;
use crate::scene::object::{DrawPassFlags, MaterialHandle, MeshObject, RenderObject};
use crate::settings::BatchSettings;

/// Vertex and index totals of the shared merged buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeLayout {
    pub total_vertices: u64,
    pub total_indices: u64,
}

/// Object table, asset registries and the three mesh passes of one scene.
///
/// All mutation happens on the thread that owns the scene; only
/// [`RenderScene::build_batches`] fans out, and it does so over the passes
/// alone.
pub struct RenderScene {
    pub(crate) renderables: Vec<RenderObject>,
    pub(crate) meshes: HandleRegistry<DrawMesh>,
    pub(crate) materials: HandleRegistry<Arc<Material>>,
    pub(crate) dirty: DirtyTracker,
    pub(crate) passes: PerPass<MeshPass>,
    pub(crate) settings: BatchSettings,
    pub(crate) pool: Option<rayon::ThreadPool>,
    pub(crate) object_buffer: Option<ObjectBuffer>,
    pub(crate) merged_geometry: Option<MergedGeometry>,
    /// Dirty objects were dropped without being uploaded.
    pub(crate) object_data_stale: bool,
}

impl RenderScene {
    pub fn new(settings: BatchSettings) -> Self {
        let pool = build_worker_pool(&settings);

        Self {
            renderables: Vec::new(),
            meshes: HandleRegistry::new(),
            materials: HandleRegistry::new(),
            dirty: DirtyTracker::new(),
            passes: PerPass::from_fn(MeshPass::new),
            settings,
            pool,
            object_buffer: None,
            merged_geometry: None,
            object_data_stale: false,
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Adds an object to the table and queues it for every pass its material
    /// and draw flags allow.
    pub fn register_object(&mut self, object: &MeshObject) -> Handle<RenderObject> {
        let mesh = self.get_mesh_handle(&object.mesh);
        let material = self.get_material_handle(&object.material);

        let handle = Handle::from_index(self.renderables.len());
        self.renderables.push(RenderObject {
            mesh,
            material,
            transform: object.transform,
            bounds: object.bounds,
            custom_sort_key: object.custom_sort_key,
            draw_passes: object.draw_passes,
            update_index: None,
            pass_indices: PerPass::default(),
            registered: true,
        });

        self.route_object(handle);
        self.update_object(handle);
        handle
    }

    pub fn register_object_batch(&mut self, objects: &[MeshObject]) -> Vec<Handle<RenderObject>> {
        self.renderables.reserve(objects.len());
        objects
            .iter()
            .map(|object| self.register_object(object))
            .collect()
    }

    pub fn update_transform(&mut self, handle: Handle<RenderObject>, local_to_world: Mat4) {
        self.get_object_mut(handle).transform = local_to_world;
        self.update_object(handle);
    }

    /// Re-queues the object in every pass it is currently batched in and
    /// flags its GPU data for upload.
    pub fn update_object(&mut self, handle: Handle<RenderObject>) {
        let object = &mut self.renderables[handle.idx()];

        for (kind, index) in object.pass_indices.iter_mut() {
            if let Some(pass_object) = index.take() {
                let pass = &mut self.passes[kind];
                pass.objects_to_delete.push(pass_object);
                pass.unbatched_objects.push(handle);
            }
        }

        self.mark_dirty(handle);
    }

    /// Swaps the material and re-routes the object, since the new material
    /// may have shaders for a different set of passes.
    pub fn update_material(&mut self, handle: Handle<RenderObject>, material: &Arc<Material>) {
        let material = self.get_material_handle(material);
        self.detach_from_passes(handle);

        let object = self.get_object_mut(handle);
        object.material = material;
        if object.registered {
            self.route_object(handle);
        }
        self.mark_dirty(handle);
    }

    /// Takes the object out of every pass. The record stays in the table so
    /// other handles remain valid.
    pub fn unregister_object(&mut self, handle: Handle<RenderObject>) {
        self.detach_from_passes(handle);
        self.get_object_mut(handle).registered = false;
    }

    pub fn mark_dirty(&mut self, handle: Handle<RenderObject>) {
        let object = &mut self.renderables[handle.idx()];
        self.dirty.mark(handle, &mut object.update_index);
    }

    /// Forgets every dirty object. Call it after [`RenderScene::upload`] has
    /// sent their data; clearing objects that were never uploaded makes the
    /// next upload rewrite the whole object buffer.
    pub fn clear_dirty_objects(&mut self) {
        if !self.dirty.is_empty() {
            self.object_data_stale = true;
        }
        self.reset_dirty();
    }

    pub(crate) fn reset_dirty(&mut self) {
        let renderables = &mut self.renderables;
        self.dirty
            .clear(|handle| renderables[handle.idx()].update_index = None);
    }

    pub fn dirty_objects(&self) -> &[Handle<RenderObject>] {
        self.dirty.as_slice()
    }

    /// Lays every registered mesh out back to back in the shared vertex and
    /// index space and marks it merged.
    pub fn merge_meshes(&mut self) -> MergeLayout {
        self.merge_meshes_where(|_| true)
    }

    /// Like [`RenderScene::merge_meshes`], but only meshes accepted by
    /// `include` take space in the shared buffers. Rejected meshes are reset
    /// to offset zero and unmerged so they draw from their own buffers.
    pub(crate) fn merge_meshes_where(
        &mut self,
        mut include: impl FnMut(&DrawMesh) -> bool,
    ) -> MergeLayout {
        let mut layout = MergeLayout::default();
        let mut skipped = 0;

        for mesh in self.meshes.items_mut().iter_mut() {
            if !include(&*mesh) {
                mesh.first_vertex = 0;
                mesh.first_index = 0;
                mesh.is_merged = false;
                skipped += 1;
                continue;
            }

            mesh.first_vertex = layout.total_vertices as u32;
            mesh.first_index = layout.total_indices as u32;
            mesh.is_merged = true;

            layout.total_vertices += u64::from(mesh.vertex_count);
            layout.total_indices += u64::from(mesh.index_count);
        }

        log::info!(
            "Merged {} meshes: {} vertices, {} indices",
            self.meshes.len() - skipped,
            layout.total_vertices,
            layout.total_indices
        );
        if skipped > 0 {
            log::info!("{} of {} meshes left unmerged", skipped, self.meshes.len());
        }

        layout
    }

    pub fn get_mesh_handle(&mut self, mesh: &Arc<MeshGeometry>) -> Handle<DrawMesh> {
        self.meshes
            .get_or_create(identity_of(mesh), || DrawMesh::new(Arc::clone(mesh)))
    }

    pub fn get_material_handle(&mut self, material: &Arc<Material>) -> MaterialHandle {
        self.materials
            .get_or_create(identity_of(material), || Arc::clone(material))
    }

    pub fn get_object(&self, handle: Handle<RenderObject>) -> &RenderObject {
        &self.renderables[handle.idx()]
    }

    fn get_object_mut(&mut self, handle: Handle<RenderObject>) -> &mut RenderObject {
        &mut self.renderables[handle.idx()]
    }

    pub fn get_mesh(&self, handle: Handle<DrawMesh>) -> &DrawMesh {
        &self.meshes[handle]
    }

    pub fn get_material(&self, handle: MaterialHandle) -> &Material {
        &self.materials[handle]
    }

    pub fn objects(&self) -> &[RenderObject] {
        &self.renderables
    }

    pub fn object_count(&self) -> usize {
        self.renderables.len()
    }

    pub fn meshes(&self) -> &[DrawMesh] {
        self.meshes.items().as_slice()
    }

    pub fn mesh_pass(&self, kind: MeshPassType) -> &MeshPass {
        &self.passes[kind]
    }

    pub fn mesh_pass_mut(&mut self, kind: MeshPassType) -> &mut MeshPass {
        &mut self.passes[kind]
    }

    fn route_object(&mut self, handle: Handle<RenderObject>) {
        let object = &self.renderables[handle.idx()];
        let material = &self.materials[object.material];

        for kind in target_passes(material, object.draw_passes) {
            self.passes[kind].unbatched_objects.push(handle);
        }
    }

    fn detach_from_passes(&mut self, handle: Handle<RenderObject>) {
        let object = &mut self.renderables[handle.idx()];

        for (kind, index) in object.pass_indices.iter_mut() {
            let pass = &mut self.passes[kind];
            if let Some(pass_object) = index.take() {
                pass.objects_to_delete.push(pass_object);
            }
            pass.unbatched_objects.retain(|&pending| pending != handle);
        }
    }
}

/// Passes an object with `flags` ends up in, given which shaders its
/// material provides.
pub fn target_passes(material: &Material, flags: DrawPassFlags) -> Vec<MeshPassType> {
    let mut passes = Vec::with_capacity(3);

    if flags.contains(DrawPassFlags::FORWARD) {
        if material.has_pass(MeshPassType::Transparency) {
            passes.push(MeshPassType::Transparency);
        }
        if material.has_pass(MeshPassType::Forward) {
            passes.push(MeshPassType::Forward);
        }
    }
    if flags.contains(DrawPassFlags::SHADOW) && material.has_pass(MeshPassType::DirectionalShadow) {
        passes.push(MeshPassType::DirectionalShadow);
    }

    passes
}

fn build_worker_pool(settings: &BatchSettings) -> Option<rayon::ThreadPool> {
    if !settings.parallel_passes || settings.worker_threads == 0 {
        return None;
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(settings.worker_threads)
        .thread_name(|index| format!("batch-worker-{index}"))
        .build()
    {
        Ok(pool) => {
            log::info!(
                "Created batch worker pool with {} threads",
                settings.worker_threads
            );
            Some(pool)
        }
        Err(err) => {
            log::warn!(
                "Failed to create batch worker pool ({}). Using the global rayon pool.",
                err
            );
            None
        }
    }
}

impl Default for RenderScene {
    fn default() -> Self {
        Self::new(BatchSettings::default())
    }
}
