//! Thread-local hot caches layered over the process-global host registry.
//!
//! Each worker thread keeps its own bounded, evicting copy of the data it
//! reads out of the registry's reader-writer-locked tables, so steady-state
//! lookups never take the lock. This is a thin wrapper over
//! `hashlink::LruCache`, the same structure the grounding codebase uses for
//! its own per-worker etag cache.

use std::hash::Hash;

use hashlink::LruCache;

/// A bounded, strict-LRU cache private to one worker thread.
///
/// Unlike [`crate::arc_cache::ArcCache`] this keeps no ghost lists and no
/// adaptive split — it exists purely to shield the shared registry from
/// per-request lock contention, so plain recency-based eviction is enough.
pub struct HotCache<K, V> {
  inner: LruCache<K, V>,
}

impl<K, V> HotCache<K, V>
where
  K: Eq + Hash,
{
  /// Creates a cache that holds at most `capacity` entries.
  pub fn new(capacity: usize) -> Self {
    Self {
      inner: LruCache::new(capacity),
    }
  }

  /// Inserts or updates `k`, evicting the least-recently-used entry first
  /// if the cache is already at capacity.
  pub fn put(&mut self, k: K, v: V) {
    self.inner.insert(k, v);
  }

  /// Looks up `k`, marking it most-recently-used on a hit.
  pub fn get(&mut self, k: &K) -> Option<&V> {
    self.inner.get(k)
  }

  pub fn remove(&mut self, k: &K) -> Option<V> {
    self.inner.remove(k)
  }

  pub fn clear(&mut self) {
    self.inner.clear();
  }

  pub fn len(&self) -> usize {
    self.inner.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }
}
