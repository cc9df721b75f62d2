use std::sync::Arc;

use crate::asset::{AssetCache, DrawMesh, Handle, Material};
use crate::renderer::pass::{IndirectBatch, MeshPass, Multibatch, PassObject, RenderBatch};
use crate::scene::RenderObject;

/// Read-only scene tables a pass refresh looks things up in.
#[derive(Clone, Copy)]
pub(crate) struct SceneLookup<'a> {
    pub(crate) renderables: &'a [RenderObject],
    pub(crate) materials: &'a AssetCache<Arc<Material>>,
    pub(crate) meshes: &'a AssetCache<DrawMesh>,
}

/// A render object that received a pass object during a refresh. Applied to
/// the object table by the caller once every pass has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassAssignment {
    pub(crate) object: Handle<RenderObject>,
    pub(crate) pass_object: Handle<PassObject>,
}

/// Reconciles pending deletions and insertions against the sorted flat list
/// of `pass`, then rebuilds its indirect batches and multibatches.
pub(crate) fn refresh_pass(pass: &mut MeshPass, scene: &SceneLookup<'_>) -> Vec<PassAssignment> {
    pass.needs_indirect_refresh = true;
    pass.needs_instance_refresh = true;

    if !pass.objects_to_delete.is_empty() {
        delete_objects(pass);
    }

    let assignments = insert_objects(pass, scene);

    let mut new_batches: Vec<RenderBatch> = assignments
        .iter()
        .map(|assignment| RenderBatch {
            object: assignment.pass_object,
            sort_key: pass.get(assignment.pass_object).sort_key(),
        })
        .collect();
    new_batches.sort_unstable();

    merge_sorted_tail(&mut pass.flat_batches, new_batches);

    pass.batches = build_indirect_batches(pass);
    pass.multibatches = build_multibatches(&pass.batches, scene.meshes);

    assignments
}

fn delete_objects(pass: &mut MeshPass) {
    let mut deletion_batches = Vec::with_capacity(pass.objects_to_delete.len());

    for handle in std::mem::take(&mut pass.objects_to_delete) {
        let object = pass.objects[handle.idx()].take().unwrap_or_else(|| {
            panic!(
                "{} pass: deleting {:?} which is not a live pass object",
                pass.kind.label(),
                handle
            )
        });

        pass.reusable_objects.push(handle);
        deletion_batches.push(RenderBatch {
            object: handle,
            sort_key: object.sort_key(),
        });
    }

    deletion_batches.sort_unstable();

    log::trace!(
        "{} pass: removing {} objects from {} flat batches",
        pass.kind.label(),
        deletion_batches.len(),
        pass.flat_batches.len()
    );

    let flat = std::mem::take(&mut pass.flat_batches);
    pass.flat_batches = ordered_difference(&flat, &deletion_batches).unwrap_or_else(|missing| {
        panic!(
            "{} pass: {:?} was deleted but is not in the flat batch list",
            pass.kind.label(),
            missing
        )
    });
}

/// Removes every entry of `removed` from `flat`. Both inputs must be sorted
/// by the flat-list order. Returns the first deletion that was not found.
pub(crate) fn ordered_difference(
    flat: &[RenderBatch],
    removed: &[RenderBatch],
) -> Result<Vec<RenderBatch>, RenderBatch> {
    let mut kept = Vec::with_capacity(flat.len().saturating_sub(removed.len()));
    let mut pending = removed.iter().peekable();

    for batch in flat {
        match pending.peek() {
            Some(&&next) if next == *batch => {
                pending.next();
            }
            // Sorted inputs: anything smaller than the current entry can no
            // longer be found.
            Some(&&next) if next < *batch => return Err(next),
            _ => kept.push(*batch),
        }
    }

    match pending.next() {
        Some(&missing) => Err(missing),
        None => Ok(kept),
    }
}

fn insert_objects(pass: &mut MeshPass, scene: &SceneLookup<'_>) -> Vec<PassAssignment> {
    let mut assignments = Vec::with_capacity(pass.unbatched_objects.len());

    for original in std::mem::take(&mut pass.unbatched_objects) {
        let object = &scene.renderables[original.idx()];
        let Some(material) = scene.materials[object.material].resolve(pass.kind) else {
            log::debug!(
                "{} pass: {:?} has no shader for this pass, skipping",
                pass.kind.label(),
                original
            );
            continue;
        };

        let pass_object = PassObject {
            material,
            mesh: object.mesh,
            original,
            custom_key: object.custom_sort_key,
        };

        let handle = match pass.reusable_objects.pop() {
            Some(handle) => {
                pass.objects[handle.idx()] = Some(pass_object);
                handle
            }
            None => {
                let handle = Handle::from_index(pass.objects.len());
                pass.objects.push(Some(pass_object));
                handle
            }
        };

        assignments.push(PassAssignment {
            object: original,
            pass_object: handle,
        });
    }

    log::trace!(
        "{} pass: inserted {} objects",
        pass.kind.label(),
        assignments.len()
    );

    assignments
}

/// Appends the sorted `incoming` run to the sorted `flat` list and merges the
/// two runs in place, walking from the back so each element moves once.
pub(crate) fn merge_sorted_tail(flat: &mut Vec<RenderBatch>, incoming: Vec<RenderBatch>) {
    if incoming.is_empty() {
        return;
    }
    if flat.is_empty() {
        *flat = incoming;
        return;
    }

    let mut old = flat.len();
    let mut new = incoming.len();
    flat.extend_from_slice(&incoming);

    let mut write = flat.len();
    while new > 0 {
        write -= 1;
        if old > 0 && flat[old - 1] > incoming[new - 1] {
            flat[write] = flat[old - 1];
            old -= 1;
        } else {
            flat[write] = incoming[new - 1];
            new -= 1;
        }
    }
}

/// Folds consecutive flat entries with the same mesh and material into one
/// indirect batch.
pub(crate) fn build_indirect_batches(pass: &MeshPass) -> Vec<IndirectBatch> {
    let mut batches: Vec<IndirectBatch> = Vec::new();

    for (index, entry) in pass.flat_batches.iter().enumerate() {
        let object = pass.get(entry.object);

        match batches.last_mut() {
            Some(back) if back.mesh == object.mesh && back.material == object.material => {
                back.count += 1;
            }
            _ => batches.push(IndirectBatch {
                mesh: object.mesh,
                material: object.material,
                first: index as u32,
                count: 1,
            }),
        }
    }

    batches
}

/// Folds adjacent indirect batches that can share one multi-draw call: both
/// meshes live in the merged buffers and the material is identical.
pub(crate) fn build_multibatches(
    batches: &[IndirectBatch],
    meshes: &AssetCache<DrawMesh>,
) -> Vec<Multibatch> {
    let mut multibatches: Vec<Multibatch> = Vec::new();

    for (index, batch) in batches.iter().enumerate() {
        let joins = multibatches.last().is_some_and(|current| {
            let head = &batches[current.first as usize];
            meshes[head.mesh].is_merged
                && meshes[batch.mesh].is_merged
                && head.material == batch.material
        });

        match multibatches.last_mut() {
            Some(current) if joins => current.count += 1,
            _ => multibatches.push(Multibatch {
                first: index as u32,
                count: 1,
            }),
        }
    }

    multibatches
}
