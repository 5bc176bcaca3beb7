//! Hot tier: bounded in-process LRU
//!
//! Entry-count bound, no TTL. All access goes through a `std::sync::Mutex`
//! held only for the map operation itself, never across an `.await`.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// In-process least-recently-used map
#[derive(Debug)]
pub struct HotTier<V> {
    entries: Mutex<LruCache<String, V>>,
}

impl<V: Clone> HotTier<V> {
    /// Capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, V>> {
        // Poison is ignored: no operation leaves the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: V) {
        self.lock().put(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().pop(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}
