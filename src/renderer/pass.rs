// renderer/pass.rs
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::{Index, IndexMut};

use crate::asset::{DrawMesh, Handle, PassMaterial};
use crate::renderer::internal::PassBuffers;
use crate::scene::RenderObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshPassType {
    Forward,           // Opaque lit geometry
    Transparency,      // Alpha blended forward geometry
    DirectionalShadow, // Shadow casters for the sun light
}

impl MeshPassType {
    pub const ALL: [MeshPassType; 3] = [
        MeshPassType::Forward,
        MeshPassType::Transparency,
        MeshPassType::DirectionalShadow,
    ];

    pub const fn index(self) -> usize {
        match self {
            MeshPassType::Forward => 0,
            MeshPassType::Transparency => 1,
            MeshPassType::DirectionalShadow => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MeshPassType::Forward => "Forward",
            MeshPassType::Transparency => "Transparency",
            MeshPassType::DirectionalShadow => "DirectionalShadow",
        }
    }
}

/// One value per mesh pass, indexable by [`MeshPassType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerPass<T> {
    data: [T; 3],
}

impl<T> PerPass<T> {
    pub fn from_fn(f: impl FnMut(MeshPassType) -> T) -> Self {
        Self {
            data: MeshPassType::ALL.map(f),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshPassType, &T)> {
        MeshPassType::ALL.into_iter().zip(self.data.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MeshPassType, &mut T)> {
        MeshPassType::ALL.into_iter().zip(self.data.iter_mut())
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Index<MeshPassType> for PerPass<T> {
    type Output = T;

    fn index(&self, pass: MeshPassType) -> &T {
        &self.data[pass.index()]
    }
}

impl<T> IndexMut<MeshPassType> for PerPass<T> {
    fn index_mut(&mut self, pass: MeshPassType) -> &mut T {
        &mut self.data[pass.index()]
    }
}

/// Pass-local projection of a [`RenderObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassObject {
    pub material: PassMaterial,
    pub mesh: Handle<DrawMesh>,
    pub original: Handle<RenderObject>,
    pub custom_key: u32,
}

impl PassObject {
    /// Low 32 bits group by pipeline, descriptor set and mesh; the high 32
    /// bits carry the application's sort key.
    pub fn sort_key(&self) -> u64 {
        let pipeline_hash = identity_hash(self.material.pipeline.0);
        let set_hash = identity_hash(self.material.descriptor_set.0);
        let material_hash = (pipeline_hash ^ set_hash) as u32;
        let mesh_material = material_hash ^ self.mesh.raw();

        u64::from(mesh_material) | (u64::from(self.custom_key) << 32)
    }
}

fn identity_hash(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// One entry of the flat per-pass draw list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderBatch {
    pub object: Handle<PassObject>,
    pub sort_key: u64,
}

// Total order of the flat list: key first, pass object handle breaks ties.
impl Ord for RenderBatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key
            .cmp(&other.sort_key)
            .then_with(|| self.object.cmp(&other.object))
    }
}

impl PartialOrd for RenderBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Run of the flat list drawn with one indirect command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectBatch {
    pub mesh: Handle<DrawMesh>,
    pub material: PassMaterial,
    pub first: u32,
    pub count: u32,
}

/// Run of indirect batches submitted with one multi-draw-indirect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multibatch {
    pub first: u32,
    pub count: u32,
}

/// Everything one render pass needs to batch its objects.
///
/// Not a GPU render pass: it is the set of objects and draw ranges that the
/// cull stage and the draw submission for that pass consume.
pub struct MeshPass {
    pub(crate) kind: MeshPassType,
    pub(crate) unbatched_objects: Vec<Handle<RenderObject>>,
    pub(crate) objects_to_delete: Vec<Handle<PassObject>>,
    pub(crate) reusable_objects: Vec<Handle<PassObject>>,
    pub(crate) objects: Vec<Option<PassObject>>,
    pub(crate) flat_batches: Vec<RenderBatch>,
    pub(crate) batches: Vec<IndirectBatch>,
    pub(crate) multibatches: Vec<Multibatch>,
    pub(crate) needs_indirect_refresh: bool,
    pub(crate) needs_instance_refresh: bool,
    pub(crate) gpu: Option<PassBuffers>,
}

impl MeshPass {
    pub fn new(kind: MeshPassType) -> Self {
        Self {
            kind,
            unbatched_objects: Vec::new(),
            objects_to_delete: Vec::new(),
            reusable_objects: Vec::new(),
            objects: Vec::new(),
            flat_batches: Vec::new(),
            batches: Vec::new(),
            multibatches: Vec::new(),
            needs_indirect_refresh: true,
            needs_instance_refresh: true,
            gpu: None,
        }
    }

    pub fn kind(&self) -> MeshPassType {
        self.kind
    }

    /// Live pass object behind `handle`. Panics on a freed or unknown slot.
    pub fn get(&self, handle: Handle<PassObject>) -> &PassObject {
        self.objects
            .get(handle.idx())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| {
                panic!(
                    "{} pass: {:?} does not reference a live pass object",
                    self.kind.label(),
                    handle
                )
            })
    }

    pub fn try_get(&self, handle: Handle<PassObject>) -> Option<&PassObject> {
        self.objects.get(handle.idx()).and_then(Option::as_ref)
    }

    pub fn flat_batches(&self) -> &[RenderBatch] {
        &self.flat_batches
    }

    pub fn batches(&self) -> &[IndirectBatch] {
        &self.batches
    }

    pub fn multibatches(&self) -> &[Multibatch] {
        &self.multibatches
    }

    pub fn unbatched_objects(&self) -> &[Handle<RenderObject>] {
        &self.unbatched_objects
    }

    pub fn objects_to_delete(&self) -> &[Handle<PassObject>] {
        &self.objects_to_delete
    }

    pub fn reusable_objects(&self) -> &[Handle<PassObject>] {
        &self.reusable_objects
    }

    pub fn live_object_count(&self) -> usize {
        self.objects.len() - self.reusable_objects.len()
    }

    pub fn needs_indirect_refresh(&self) -> bool {
        self.needs_indirect_refresh
    }

    pub fn needs_instance_refresh(&self) -> bool {
        self.needs_instance_refresh
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.unbatched_objects.is_empty() || !self.objects_to_delete.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_object(mesh: u32, set: u64, pipeline: u64, custom_key: u32) -> PassObject {
        PassObject {
            material: PassMaterial::new(set, pipeline),
            mesh: Handle::new(mesh),
            original: Handle::new(0),
            custom_key,
        }
    }

    #[test]
    fn custom_key_dominates_sort_order() {
        let low = pass_object(7, 3, 9, 1);
        let high = pass_object(0, 0, 0, 2);
        assert!(low.sort_key() < high.sort_key());
        assert_eq!(high.sort_key() >> 32, 2);
    }

    #[test]
    fn identical_mesh_and_material_share_a_key() {
        let a = pass_object(4, 11, 12, 0);
        let b = pass_object(4, 11, 12, 0);
        assert_eq!(a.sort_key(), b.sort_key());
    }

    #[test]
    fn render_batches_tie_break_on_handle() {
        let a = RenderBatch {
            object: Handle::new(3),
            sort_key: 10,
        };
        let b = RenderBatch {
            object: Handle::new(1),
            sort_key: 10,
        };
        let c = RenderBatch {
            object: Handle::new(0),
            sort_key: 11,
        };
        let mut list = vec![c, a, b];
        list.sort();
        assert_eq!(list, vec![b, a, c]);
    }

    #[test]
    fn per_pass_indexes_by_type() {
        let mut values = PerPass::from_fn(|pass| pass.index() * 10);
        values[MeshPassType::DirectionalShadow] += 1;
        assert_eq!(values[MeshPassType::Forward], 0);
        assert_eq!(values[MeshPassType::Transparency], 10);
        assert_eq!(values[MeshPassType::DirectionalShadow], 21);
    }

    #[test]
    #[should_panic(expected = "does not reference a live pass object")]
    fn get_on_freed_slot_panics() {
        let mut pass = MeshPass::new(MeshPassType::Forward);
        pass.objects.push(None);
        let _ = pass.get(Handle::new(0));
    }
}
