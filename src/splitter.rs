//! # Splitter
//!
//! A [`Splitter`] decides, one item at a time, whether the item just appended to a
//! [`crate::node::NodeBuilder`] should end the current chunk. Two independent strategies are
//! provided, selected per [`crate::config::SplitStrategy`]. Each level of a tree
//! gets its own splitter instance, salted by level so that boundaries at one level don't line up
//! mechanically with boundaries at another.

use crate::config::{KeyHashParams, RollingHashParams};
use sha2::{Digest, Sha512};
use xxhash_rust::xxh32::xxh32;

/// Decides chunk boundaries as items are appended. One instance is scoped to a single tree
/// level for the lifetime of a [`crate::chunker::Chunker`].
pub trait Splitter: Send {
  /// Feeds the next `(key, value)` item to the splitter; returns `true` if this item should be
  /// the last one in the current chunk.
  fn append(&mut self, key: &[u8], value: &[u8]) -> bool;

  /// Resets accumulated state, e.g. after a boundary has been forced externally (the builder
  /// hit its hard [`crate::node::MAX_NODE_SIZE`] before the splitter fired).
  fn reset(&mut self);
}

/// Derives a per-level salt so that boundary decisions at different levels of the same tree
/// don't correlate. Uses SHA-512 rather than the tree's own SHA-256 so that a collision in one
/// hash family can't simultaneously defeat both addressing and chunking.
fn level_salt(level: u8) -> [u8; 8] {
  let mut hasher = Sha512::new();
  hasher.update([level]);
  let digest = hasher.finalize();
  let mut salt = [0u8; 8];
  salt.copy_from_slice(&digest[..8]);
  salt
}

/// The Weibull CDF: `1 - exp(-(x/scale)^shape)`.
fn weibull_cdf(x: f64, scale: f64, shape: f64) -> f64 {
  1.0 - (-(x / scale).powf(shape)).exp()
}

/// Splits chunks by comparing a hash of each key against a size-dependent Weibull threshold.
/// Only the key, never the value, drives the boundary decision -- this is what
/// lets unrelated trees that happen to share a run of keys converge on the same chunk
/// boundaries regardless of the values attached.
pub struct KeyHashSplitter {
  params: KeyHashParams,
  seed: u32,
  min_chunk_size: u32,
  max_chunk_size: u32,
  size_since_boundary: f64,
}

impl KeyHashSplitter {
  /// Builds a key-hash splitter for the given level, gated by `min_chunk_size`/`max_chunk_size`.
  pub fn new(params: KeyHashParams, level: u8, min_chunk_size: u32, max_chunk_size: u32) -> Self {
    let salt = level_salt(level);
    let seed = u32::from_le_bytes([salt[0], salt[1], salt[2], salt[3]]);
    KeyHashSplitter { params, seed, min_chunk_size, max_chunk_size, size_since_boundary: 0.0 }
  }
}

impl Splitter for KeyHashSplitter {
  fn append(&mut self, key: &[u8], value: &[u8]) -> bool {
    self.size_since_boundary += (key.len() + value.len()) as f64;
    let boundary = if self.size_since_boundary < self.min_chunk_size as f64 {
      false
    } else if self.size_since_boundary > self.max_chunk_size as f64 {
      true
    } else {
      let hash = xxh32(key, self.seed);
      // Map the hash to a uniform sample in (0, 1) and treat it as a one-shot draw against the
      // boundary CDF evaluated at the current accumulated size.
      let r = (hash as f64 + 0.5) / (u32::MAX as f64 + 1.0);
      r < weibull_cdf(self.size_since_boundary, self.params.target_size, self.params.k)
    };
    if boundary {
      self.size_since_boundary = 0.0;
    }
    boundary
  }

  fn reset(&mut self) {
    self.size_since_boundary = 0.0;
  }
}

const GEAR_SIZE: usize = 256;

const fn splitmix64(seed: u64) -> u64 {
  let mut z = seed.wrapping_add(0x9E3779B97F4A7C15);
  z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
  z ^ (z >> 31)
}

const fn gear_table() -> [u64; GEAR_SIZE] {
  let mut table = [0u64; GEAR_SIZE];
  let mut i = 0usize;
  while i < GEAR_SIZE {
    table[i] = splitmix64(i as u64 + 1);
    i += 1;
  }
  table
}

static GEAR: [u64; GEAR_SIZE] = gear_table();

/// Converts a target chunk size into a bitmask width, rounding to the nearest power of two.
fn target_bits(target_size: f64) -> u32 {
  target_size.max(2.0).log2().round().clamp(1.0, 63.0) as u32
}

/// Splits chunks with a gear-style rolling hash over a sliding byte window. Unlike
/// [`KeyHashSplitter`], both the key and the value bytes feed the hash, so boundaries track the
/// raw content stream rather than key identity alone.
pub struct RollingHashSplitter {
  mask: u64,
  salt_pattern: u64,
  window: u32,
  min_chunk_size: u32,
  max_chunk_size: u32,
  hash: u64,
  bytes_seen: u32,
}

impl RollingHashSplitter {
  /// Builds a rolling-hash splitter for the given level, gated by `min_chunk_size`/`max_chunk_size`.
  pub fn new(params: RollingHashParams, level: u8, min_chunk_size: u32, max_chunk_size: u32) -> Self {
    let bits = target_bits(params.target_size);
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let salt = level_salt(level);
    let salt_pattern = u64::from_le_bytes(salt) & mask;
    RollingHashSplitter { mask, salt_pattern, window: params.window, min_chunk_size, max_chunk_size, hash: 0, bytes_seen: 0 }
  }
}

impl Splitter for RollingHashSplitter {
  fn append(&mut self, key: &[u8], value: &[u8]) -> bool {
    for &byte in key.iter().chain(value.iter()) {
      self.hash = (self.hash << 1).wrapping_add(GEAR[byte as usize]);
      self.bytes_seen += 1;
    }
    let boundary = if self.bytes_seen < self.min_chunk_size {
      false
    } else if self.bytes_seen > self.max_chunk_size {
      true
    } else {
      self.bytes_seen >= self.window && (self.hash & self.mask) == self.salt_pattern
    };
    if boundary {
      self.hash = 0;
      self.bytes_seen = 0;
    }
    boundary
  }

  fn reset(&mut self) {
    self.hash = 0;
    self.bytes_seen = 0;
  }
}
