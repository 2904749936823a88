//! Fast, non-cryptographic content hashing used to key the caches in
//! [`crate::arc_cache`] and [`crate::response_cache`].
//!
//! All digests are produced by xxh3-64, chosen for speed and good mixing
//! rather than collision resistance. Digests are stable across threads and
//! process runs of the same build, which is the only property the caches
//! rely on.

use xxhash_rust::xxh3::Xxh3;

/// Hashes a single byte slice into a 64-bit digest.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
  xxhash_rust::xxh3::xxh3_64(bytes)
}

/// Hashes one or more byte-ranges, folded together in definition order.
///
/// `hash_parts(&[doc_root.as_bytes(), path.as_bytes()])` is how the
/// response cache keys a path built from a host's web root and a
/// request-relative path without first concatenating them into one
/// owned string.
pub fn hash_parts(parts: &[&[u8]]) -> u64 {
  let mut hasher = Xxh3::new();
  for part in parts {
    hasher.update(part);
  }
  hasher.digest()
}

/// Convenience wrapper over [`hash_parts`] for exactly two strings, the
/// shape the path resolver uses most often (`document_root`, `request_path`).
pub fn hash_two(a: &str, b: &str) -> u64 {
  hash_parts(&[a.as_bytes(), b.as_bytes()])
}
