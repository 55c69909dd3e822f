//! # NodeStore
//!
//! A [`NodeStore`] is where [`crate::node::Node`]s and [`crate::config::ChunkConfig`]s actually
//! get written and read, layering an LRU cache of decoded nodes over a [`BlockStore`] so that hot
//! paths (repeated reads of the same internal nodes during a cursor walk) don't pay a decode
//! cost twice.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::config::ChunkConfig;
use crate::error::Result;
use crate::node::Node;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Reads and writes content-addressed [`Node`]s and [`ChunkConfig`]s through a [`BlockStore`],
/// caching decoded nodes so repeated reads of the same address skip re-decoding.
pub struct NodeStore<S: BlockStore> {
  blocks: S,
  cache: Mutex<LruCache<Address, Node>>,
}

impl<S: BlockStore> NodeStore<S> {
  /// Wraps `blocks` with a decoded-node cache sized per `cache_capacity`.
  pub fn new(blocks: S, cache_capacity: usize) -> Self {
    let capacity = NonZeroUsize::new(cache_capacity.max(1)).expect("capacity is at least 1");
    NodeStore { blocks, cache: Mutex::new(LruCache::new(capacity)) }
  }

  /// Reads and decodes the node at `address`, serving from cache when possible.
  #[tracing::instrument(level = "trace", skip(self))]
  pub fn read_node(&self, address: &Address) -> Result<Node> {
    if let Some(node) = self.cache.lock().unwrap().get(address) {
      return Ok(node.clone());
    }
    let bytes = self.blocks.get(address)?;
    let node = Node::decode(&bytes)?;
    self.cache.lock().unwrap().put(*address, node.clone());
    Ok(node)
  }

  /// Encodes and writes `node`, returning its content address. Also populates the decoded-node
  /// cache, since a just-written node is the node most likely to be read next (a chunker's
  /// parent almost always re-reads the child it just emitted).
  #[tracing::instrument(level = "trace", skip(self, node))]
  pub fn write_node(&self, node: &Node) -> Result<Address> {
    let bytes = node.encode()?;
    let address = Address::of(&bytes);
    self.blocks.put(&address, &bytes)?;
    self.cache.lock().unwrap().put(address, node.clone());
    Ok(address)
  }

  /// Reads and decodes the chunk configuration at `address`.
  pub fn read_chunk_config(&self, address: &Address) -> Result<ChunkConfig> {
    let bytes = self.blocks.get(address)?;
    crate::codec::decode(&bytes)
  }

  /// Encodes and writes `config`, returning its content address.
  pub fn write_chunk_config(&self, config: &ChunkConfig) -> Result<Address> {
    let bytes = config.encode()?;
    let address = Address::of(&bytes);
    self.blocks.put(&address, &bytes)?;
    Ok(address)
  }

  /// Direct access to the underlying block store, e.g. for callers that need to check
  /// existence without paying a decode cost.
  pub fn blocks(&self) -> &S {
    &self.blocks
  }
}
