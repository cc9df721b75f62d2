use crate::asset::Handle;
use crate::scene::RenderObject;

/// Objects whose GPU-side data must be re-uploaded.
///
/// Each object remembers its own position in the list, so "already dirty" is
/// a field check instead of a search.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    objects: Vec<Handle<RenderObject>>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` unless `slot` shows it is already tracked. Returns true
    /// when it was newly added.
    pub fn mark(&mut self, handle: Handle<RenderObject>, slot: &mut Option<usize>) -> bool {
        if slot.is_some() {
            return false;
        }

        *slot = Some(self.objects.len());
        self.objects.push(handle);
        true
    }

    /// Empties the list, handing every tracked handle to `reset` so its
    /// recorded position can be cleared.
    pub fn clear(&mut self, mut reset: impl FnMut(Handle<RenderObject>)) {
        for handle in self.objects.drain(..) {
            reset(handle);
        }
    }

    pub fn as_slice(&self) -> &[Handle<RenderObject>] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
