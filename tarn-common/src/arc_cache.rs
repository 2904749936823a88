//! A bounded Adaptive Replacement Cache (ARC), used to back the host
//! registry, filesystem metadata, and response caches described in the
//! data model.
//!
//! ARC keeps four ordered lists: `T1`/`T2` hold resident entries (recency
//! vs. frequency), `B1`/`B2` hold ghost keys recently evicted from `T1`/`T2`.
//! A hit in a ghost list nudges the target split `p` towards the side that
//! ghosted, so the cache adapts to whether the workload rewards recency or
//! frequency. See Megiddo & Modha, "ARC: A Self-Tuning, Low Overhead
//! Replacement Cache" (FAST '03).
//!
//! Each of the four lists is a `hashlink::LinkedHashMap`, which already
//! gives O(1) get/insert/remove plus O(1) move-to-front-or-back, so a
//! separate intrusive list with a side index map would buy nothing further.
//! `LinkedHashMap` keeps the least-recently-touched entry at the front and
//! the most-recently-touched at the back; "promote" below always means
//! `to_back`, "evict" always means `pop_front`.

use std::hash::Hash;

use hashlink::LinkedHashMap;

/// An adaptive-replacement cache bounded to `max_size` resident entries.
pub struct ArcCache<K, V> {
  max_size: usize,
  p: usize,
  t1: LinkedHashMap<K, V>,
  t2: LinkedHashMap<K, V>,
  b1: LinkedHashMap<K, ()>,
  b2: LinkedHashMap<K, ()>,
}

impl<K, V> ArcCache<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Creates an empty cache that holds at most `max_size` resident entries.
  pub fn new(max_size: usize) -> Self {
    Self {
      max_size,
      p: 0,
      t1: LinkedHashMap::new(),
      t2: LinkedHashMap::new(),
      b1: LinkedHashMap::new(),
      b2: LinkedHashMap::new(),
    }
  }

  /// Current count of resident entries (`|T1| + |T2|`).
  pub fn len(&self) -> usize {
    self.t1.len() + self.t2.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The current target size of `T1`, adapted by ghost-list hits.
  pub fn target_p(&self) -> usize {
    self.p
  }

  /// Inserts or updates `k`, following the ARC state-transition rules.
  pub fn put(&mut self, k: K, v: V) {
    if self.t1.remove(&k).is_some() {
      self.t2.insert(k, v);
      return;
    }

    if self.t2.contains_key(&k) {
      self.t2.insert(k.clone(), v);
      self.t2.to_back(&k);
      return;
    }

    if self.b1.contains_key(&k) {
      let delta = (self.b2.len() / self.b1.len()).max(1);
      self.p = (self.p + delta).min(self.max_size);
      self.b1.remove(&k);
      self.make_room();
      self.t2.insert(k, v);
      return;
    }

    if self.b2.contains_key(&k) {
      let delta = (self.b1.len() / self.b2.len()).max(1);
      self.p = self.p.saturating_sub(delta);
      self.b2.remove(&k);
      self.make_room();
      self.t2.insert(k, v);
      return;
    }

    self.make_room();
    self.t1.insert(k, v);
  }

  /// Looks up `k`, promoting it per the ARC recency/frequency rules. A hit
  /// in a ghost list is a cache miss — ghost lists carry no values.
  pub fn get(&mut self, k: &K) -> Option<&V> {
    if let Some(v) = self.t1.remove(k) {
      self.t2.insert(k.clone(), v);
      return self.t2.get(k);
    }
    if self.t2.contains_key(k) {
      self.t2.to_back(k);
      return self.t2.get(k);
    }
    None
  }

  /// Looks up `k` without mutating list order or ghost state.
  pub fn peek(&self, k: &K) -> Option<&V> {
    self.t1.get(k).or_else(|| self.t2.get(k))
  }

  /// Removes `k` from whichever list currently hosts it.
  pub fn remove(&mut self, k: &K) -> Option<V> {
    if let Some(v) = self.t1.remove(k) {
      return Some(v);
    }
    if let Some(v) = self.t2.remove(k) {
      return Some(v);
    }
    self.b1.remove(k);
    self.b2.remove(k);
    None
  }

  /// Makes room for one new resident entry, evicting the appropriate LRU
  /// entry into its ghost list if residency is already at capacity.
  /// Called before every insertion of a genuinely new resident entry, so
  /// the entry about to be inserted is never itself the eviction target.
  fn make_room(&mut self) {
    if self.t1.len() + self.t2.len() >= self.max_size {
      let evict_from_t1 = !self.t1.is_empty() && (self.t1.len() > self.p || self.t2.is_empty());
      if evict_from_t1 {
        if let Some((key, _)) = self.t1.pop_front() {
          self.b1.insert(key, ());
        }
      } else if let Some((key, _)) = self.t2.pop_front() {
        self.b2.insert(key, ());
      }
    }

    while self.b1.len() > self.max_size {
      self.b1.pop_front();
    }
    while self.b2.len() > self.max_size {
      self.b2.pop_front();
    }
  }
}
