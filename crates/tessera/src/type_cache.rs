use std::sync::Arc;

use hashlink::lru_cache::LruCache;

use crate::ObjectType;

/// Default capacity for [`TypeCache`].
pub(crate) const DEFAULT_CAPACITY: usize = 128;

/// A cache of described types, keyed on the name they were looked up by. When
/// full, the least recently used type gets removed.
#[derive(Debug)]
pub(crate) struct TypeCache {
    inner: LruCache<String, Arc<ObjectType>>,
}

impl TypeCache {
    /// Create a new cache with the given `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity.max(1)),
        }
    }

    pub fn get(&mut self, name: &str) -> Option<Arc<ObjectType>> {
        self.inner.get(name).cloned()
    }

    /// Inserts a type, returning the least recently used type if the cache is
    /// full, or the replaced type when the name was already present.
    pub fn insert(&mut self, name: &str, ty: Arc<ObjectType>) -> Option<Arc<ObjectType>> {
        let mut lru_item = None;

        if self.capacity() == self.len() && !self.inner.contains_key(name) {
            lru_item = self.inner.remove_lru().map(|(_, v)| v);
        } else if self.inner.contains_key(name) {
            lru_item = self.inner.remove(name);
        }

        self.inner.insert(name.into(), ty);

        lru_item
    }

    /// The number of types in the cache.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
