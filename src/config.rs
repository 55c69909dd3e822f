//! # Chunk configuration
//!
//! A [`ChunkConfig`] is persisted exactly once per tree and referenced by every node in it.
//! It is built with plain constructors -- there is no global or process-wide default threaded
//! implicitly through the chunker.

use crate::address::Address;
use crate::codec;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Default minimum chunk size before a boundary is eligible to fire.
pub const DEFAULT_MIN_CHUNK_SIZE: u32 = 1 << 9;
/// Default maximum chunk size past which a boundary is forced.
pub const DEFAULT_MAX_CHUNK_SIZE: u32 = 1 << 14;
/// Target chunk size used by both splitter variants.
pub const DEFAULT_TARGET_SIZE: f64 = 4096.0;
/// Weibull shape parameter for the key-hash splitter.
pub const DEFAULT_K: f64 = 4.0;
/// Rolling-hash window size in bytes.
pub const DEFAULT_ROLLING_WINDOW: u32 = 67;

/// Parameters for the key-hash splitter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyHashParams {
  /// `L` in the Weibull CDF; the distribution's scale parameter.
  pub target_size: f64,
  /// `K` in the Weibull CDF; the distribution's shape parameter.
  pub k: f64,
}

impl Default for KeyHashParams {
  fn default() -> Self {
    KeyHashParams { target_size: DEFAULT_TARGET_SIZE, k: DEFAULT_K }
  }
}

/// Parameters for the rolling-hash splitter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollingHashParams {
  /// Width, in bytes, of the rolling window.
  pub window: u32,
  /// Target chunk size the dynamic bit-mask is tuned toward.
  pub target_size: f64,
}

impl Default for RollingHashParams {
  fn default() -> Self {
    RollingHashParams { window: DEFAULT_ROLLING_WINDOW, target_size: DEFAULT_TARGET_SIZE }
  }
}

/// Which boundary-decision strategy a [`ChunkConfig`] uses, and its strategy-specific params.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SplitStrategy {
  /// Boundary decisions are a function of the key's hash.
  KeyHash(KeyHashParams),
  /// Boundary decisions are a function of a rolling hash over record bytes.
  RollingHash(RollingHashParams),
}

/// Chunk configuration: persisted once per tree, referenced by every node.
///
/// Changing configuration across the lifetime of a tree is forbidden -- doing so silently
/// degrades performance and can violate boundary stability.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
  /// No boundary fires below this accumulated chunk size.
  pub min_chunk_size: u32,
  /// A boundary is forced once accumulated chunk size exceeds this.
  pub max_chunk_size: u32,
  /// The splitter strategy and its parameters.
  pub strategy: SplitStrategy,
}

impl ChunkConfig {
  /// The default configuration: key-hash splitting with the standard size bounds and Weibull
  /// parameters.
  pub fn default_key_hash() -> Self {
    ChunkConfig {
      min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
      max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
      strategy: SplitStrategy::KeyHash(KeyHashParams::default()),
    }
  }

  /// A configuration using the rolling-hash splitter instead, same size bounds.
  pub fn default_rolling_hash() -> Self {
    ChunkConfig {
      min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
      max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
      strategy: SplitStrategy::RollingHash(RollingHashParams::default()),
    }
  }

  /// Canonical encoding of this configuration.
  pub fn encode(&self) -> Result<Vec<u8>> {
    codec::encode(self)
  }

  /// The content address this configuration would be stored under.
  pub fn address(&self) -> Result<Address> {
    Ok(Address::of(&self.encode()?))
  }
}

impl Default for ChunkConfig {
  fn default() -> Self {
    Self::default_key_hash()
  }
}

/// Configuration for a [`crate::node_store::NodeStore`]'s decoded-node cache. Not persisted --
/// purely a local resource knob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeStoreConfig {
  /// Maximum number of decoded nodes the LRU cache holds.
  pub cache_capacity: usize,
}

impl Default for NodeStoreConfig {
  fn default() -> Self {
    NodeStoreConfig { cache_capacity: 1024 }
  }
}
