use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use super::Handle;

/// Dense, append-only storage addressed by [`Handle`].
pub struct AssetCache<T> {
    items: Vec<T>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        let handle = Handle::from_index(self.items.len());
        self.items.push(item);
        handle
    }

    pub fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);
    }

    /// Get a reference to an item by handle.
    /// Returns None if the handle is out of range.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.idx())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.idx())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| (Handle::from_index(index), item))
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Handles only come from the cache that issued them, so an out-of-range
// index is a broken caller and panics like a slice index would.
impl<T> Index<Handle<T>> for AssetCache<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.idx()]
    }
}

impl<T> IndexMut<Handle<T>> for AssetCache<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.idx()]
    }
}

/// Address of a shared asset, used as its identity.
pub fn identity_of<S: ?Sized>(shared: &Arc<S>) -> usize {
    Arc::as_ptr(shared) as *const () as usize
}

/// Deduplicating front of an [`AssetCache`]: the same external identity
/// always maps to the same dense handle.
///
/// There is no removal; entries live as long as the registry.
pub struct HandleRegistry<T> {
    cache: AssetCache<T>,
    lookup: HashMap<usize, Handle<T>>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            cache: AssetCache::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, identity: usize, create: impl FnOnce() -> T) -> Handle<T> {
        if let Some(&handle) = self.lookup.get(&identity) {
            return handle;
        }

        let handle = self.cache.insert(create());
        self.lookup.insert(identity, handle);
        handle
    }

    pub fn lookup(&self, identity: usize) -> Option<Handle<T>> {
        self.lookup.get(&identity).copied()
    }

    pub fn items(&self) -> &AssetCache<T> {
        &self.cache
    }

    pub fn items_mut(&mut self) -> &mut AssetCache<T> {
        &mut self.cache
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Handle<T>> for HandleRegistry<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.cache[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_invalid_handle_returns_none() {
        let cache: AssetCache<u32> = AssetCache::default();
        let fake_handle = Handle::new(999);
        assert!(cache.get(fake_handle).is_none());
    }

    #[test]
    fn get_valid_handle_returns_some() {
        let mut cache = AssetCache::default();
        let handle = cache.insert(42u32);
        assert_eq!(cache.get(handle), Some(&42));
        assert_eq!(cache[handle], 42);
    }

    #[test]
    #[should_panic]
    fn indexing_out_of_range_panics() {
        let cache: AssetCache<u32> = AssetCache::default();
        let _ = cache[Handle::new(0)];
    }

    #[test]
    fn registry_deduplicates_by_identity() {
        let a = Arc::new("mesh-a");
        let b = Arc::new("mesh-a");
        let mut registry = HandleRegistry::new();

        let first = registry.get_or_create(identity_of(&a), || a.to_string());
        let again = registry.get_or_create(identity_of(&a.clone()), || unreachable!());
        let other = registry.get_or_create(identity_of(&b), || b.to_string());

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(identity_of(&b)), Some(other));
    }
}
