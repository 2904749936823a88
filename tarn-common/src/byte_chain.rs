//! An immutable, reference-counted chain of byte buffers.
//!
//! The streaming file reader (see the binary crate's `static_file` module)
//! accumulates a file's body one `read()`-sized chunk at a time. Once the
//! read reaches EOF, those chunks are assembled into a [`ByteChain`] and
//! stored in the response cache. `Bytes` is already a refcounted,
//! zero-copy-clone buffer; a chain of them avoids a second copy to
//! concatenate the chunks into one contiguous buffer before caching.
//!
//! Cloning a `ByteChain` clones the handle (an `Arc` and a length), never
//! the underlying bytes, so every worker thread sharing a response cache
//! entry holds the same backing storage.

use bytes::Bytes;
use std::sync::Arc;

/// Accumulates chunks while a file is being read; consumed into a
/// [`ByteChain`] once the read completes.
#[derive(Default)]
pub struct ByteChainBuilder {
  segments: Vec<Bytes>,
  total_len: usize,
}

impl ByteChainBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends one chunk. Empty chunks are dropped rather than stored, since
  /// they carry no bytes to serve and would otherwise pad every iteration
  /// over `segments()`.
  pub fn push(&mut self, segment: Bytes) {
    if segment.is_empty() {
      return;
    }
    self.total_len += segment.len();
    self.segments.push(segment);
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn finish(self) -> ByteChain {
    ByteChain {
      segments: Arc::new(self.segments),
      total_len: self.total_len,
    }
  }
}

/// An immutable rope of `Bytes` segments, shareable across threads.
#[derive(Clone)]
pub struct ByteChain {
  segments: Arc<Vec<Bytes>>,
  total_len: usize,
}

impl ByteChain {
  /// An empty chain, for hosts that cache a zero-length body.
  pub fn empty() -> Self {
    Self {
      segments: Arc::new(Vec::new()),
      total_len: 0,
    }
  }

  /// A chain made of a single segment, the common case for small cached
  /// responses built outside the streaming reader (e.g. directory
  /// listings, module-generated bodies).
  pub fn from_bytes(bytes: Bytes) -> Self {
    let mut builder = ByteChainBuilder::new();
    builder.push(bytes);
    builder.finish()
  }

  pub fn len(&self) -> usize {
    self.total_len
  }

  pub fn is_empty(&self) -> bool {
    self.total_len == 0
  }

  /// Iterates the chain's segments in order, each a cheap `Bytes` clone.
  pub fn segments(&self) -> impl Iterator<Item = Bytes> + '_ {
    self.segments.iter().cloned()
  }

  /// Concatenates the chain into one contiguous buffer. Returns the
  /// existing segment unchanged when the chain holds exactly one, so
  /// cached single-chunk bodies never pay a copy here either.
  pub fn to_bytes(&self) -> Bytes {
    match self.segments.as_slice() {
      [] => Bytes::new(),
      [one] => one.clone(),
      many => {
        let mut out = Vec::with_capacity(self.total_len);
        for segment in many {
          out.extend_from_slice(segment);
        }
        Bytes::from(out)
      }
    }
  }
}
