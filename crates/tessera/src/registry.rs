use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::object::ObjectInner;

#[derive(Debug, Default)]
struct Slots {
    slots: Vec<Option<Weak<ObjectInner>>>,
    free: Vec<usize>,
    /// Set once drained. Nothing can be added afterwards.
    closed: bool,
}

/// The top level instances open on a connection.
///
/// Entries are weak, so registration never keeps an instance alive. Slots are
/// reused once removed.
#[derive(Debug, Default)]
pub(crate) struct HandleRegistry {
    inner: Mutex<Slots>,
}

impl HandleRegistry {
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an instance, returning its slot, or `None` if the registry
    /// has been drained.
    pub fn add(&self, object: &Arc<ObjectInner>) -> Option<usize> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        let entry = Some(Arc::downgrade(object));
        Some(match inner.free.pop() {
            Some(slot) => {
                inner.slots[slot] = entry;
                slot
            }
            None => {
                inner.slots.push(entry);
                inner.slots.len() - 1
            }
        })
    }

    pub fn remove(&self, slot: usize) {
        let mut inner = self.lock();
        let removed = inner.slots.get_mut(slot).and_then(Option::take);
        if removed.is_some() {
            inner.free.push(slot);
        }
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    /// Empty the registry, returning the instances that are still alive.
    pub fn drain(&self) -> Vec<Arc<ObjectInner>> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.free.clear();
        inner
            .slots
            .drain(..)
            .flatten()
            .filter_map(|weak| weak.upgrade())
            .collect()
    }
}
