//! Per-worker cache of fully-read static response bodies.
//!
//! Keyed by a hash of the resolved filesystem path, so a hit skips the
//! streaming file reader entirely. Recommended (see the concurrency
//! model) to live one-per-worker-thread rather than behind a shared lock:
//! duplicating a small, idempotent body across workers is cheaper than
//! contending on it.

use crate::arc_cache::ArcCache;
use crate::byte_chain::ByteChain;

#[derive(Clone)]
pub struct ResponseCacheEntry {
  pub content_type: &'static str,
  pub body: ByteChain,
}

/// A worker-local response cache. Not `Sync`; each worker thread owns one.
pub struct ResponseCache {
  inner: ArcCache<u64, ResponseCacheEntry>,
}

impl ResponseCache {
  pub fn new(max_size: usize) -> Self {
    Self {
      inner: ArcCache::new(max_size),
    }
  }

  pub fn get(&mut self, path_hash: u64) -> Option<&ResponseCacheEntry> {
    self.inner.get(&path_hash)
  }

  /// Stores a fully-read body. Callers must only reach this after a
  /// complete EOF-terminated read — a partial body from an error or
  /// client abort must never be inserted.
  pub fn put(&mut self, path_hash: u64, entry: ResponseCacheEntry) {
    self.inner.put(path_hash, entry);
  }

  pub fn remove(&mut self, path_hash: u64) {
    self.inner.remove(&path_hash);
  }
}
