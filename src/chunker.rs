//! # Chunker
//!
//! A [`Chunker`] drives one level of the tree: it accumulates `(key, value, subtree_count)`
//! triples into a [`NodeBuilder`], asks a [`Splitter`] after each one whether this ends the
//! current chunk, and when it does, writes the finished node and forwards a reference to it
//! up to a lazily-created chunker for the level above.
//!
//! Two invariants this module is responsible for maintaining:
//! - **Non-degenerate nodes while streaming**: while a chunk boundary is being decided mid-stream,
//!   a level whose builder holds exactly one pending child never flushes it as its own node; it
//!   keeps accumulating until there is a second child to split alongside it, so a boundary never
//!   manufactures a node with a single child that would only retrigger the same shape one level up.
//! - **Canonical root**: at finalization, a level whose final tally is exactly one child is either
//!   folded into a pending ancestor (if one exists, its lone item is still written out and
//!   forwarded normally to join its siblings) or, if nothing above it is pending either, collapsed
//!   away entirely by promoting straight down to the first descendant that is a leaf or holds more
//!   than one item. This ensures two trees holding the same keys always converge on the same root
//!   address regardless of how many levels were touched while building them.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::config::{ChunkConfig, SplitStrategy};
use crate::error::Result;
use crate::node::NodeBuilder;
use crate::node_store::NodeStore;
use crate::splitter::{KeyHashSplitter, RollingHashSplitter, Splitter};
use std::sync::Arc;

fn make_splitter(config: &ChunkConfig, level: u8) -> Box<dyn Splitter> {
  match config.strategy {
    SplitStrategy::KeyHash(params) => {
      Box::new(KeyHashSplitter::new(params, level, config.min_chunk_size, config.max_chunk_size))
    }
    SplitStrategy::RollingHash(params) => {
      Box::new(RollingHashSplitter::new(params, level, config.min_chunk_size, config.max_chunk_size))
    }
  }
}

/// Drives chunk-boundary decisions for a single tree level, lazily creating the chunker for the
/// level above it the first time it has a finished node to report.
pub struct Chunker<S: BlockStore> {
  store: Arc<NodeStore<S>>,
  chunk_config_addr: Address,
  chunk_config: ChunkConfig,
  builder: NodeBuilder,
  splitter: Box<dyn Splitter>,
  parent: Option<Box<Chunker<S>>>,
}

impl<S: BlockStore> Chunker<S> {
  /// Creates a chunker for `level`, writing finished nodes through `store` and tagged with
  /// `chunk_config_addr`.
  pub fn new(store: Arc<NodeStore<S>>, level: u8, chunk_config_addr: Address, chunk_config: ChunkConfig) -> Self {
    let splitter = make_splitter(&chunk_config, level);
    Chunker {
      store,
      chunk_config_addr,
      chunk_config,
      builder: NodeBuilder::new(level, chunk_config_addr),
      splitter,
      parent: None,
    }
  }

  /// The level this chunker accumulates items for.
  pub fn level(&self) -> u8 {
    self.builder.level()
  }

  /// Whether this chunker or any ancestor above it still holds an unflushed item.
  fn any_pending(&self) -> bool {
    self.builder.count() > 0 || self.parent.as_deref().map(Chunker::any_pending).unwrap_or(false)
  }

  /// Appends the next `(key, value)` item, with `value` being a leaf value at level 0 or a
  /// child's address bytes at higher levels, and `subtree_count` the number of leaf items that
  /// item represents (`1` at level 0).
  pub fn append(&mut self, key: &[u8], value: &[u8], subtree_count: u64) -> Result<()> {
    if !self.builder.has_capacity(key, value) {
      if self.builder.count() == 0 {
        panic!("item of {} bytes exceeds the maximum node size", key.len() + value.len());
      }
      self.handle_boundary()?;
    }
    self.builder.add_item(key, value, subtree_count);
    if self.splitter.append(key, value) {
      self.handle_boundary()?;
    }
    Ok(())
  }

  fn handle_boundary(&mut self) -> Result<()> {
    if self.builder.level() > 0 && self.builder.count() == 1 {
      return Ok(());
    }
    let node = self.builder.build();
    let last_key = node.last_key().expect("a just-built node from a non-degenerate flush is never empty").to_vec();
    let subtree_count = node.total_count();
    let address = self.store.write_node(&node)?;
    self.splitter.reset();
    self.append_to_parent(&last_key, address, subtree_count)
  }

  /// Returns the chunker for `level`, lazily creating it (and any intermediate ancestor
  /// chunkers) if it does not exist yet. Used by the mutator to forward an unchanged subtree
  /// directly into the level it already lives at, instead of re-chunking it leaf by leaf.
  pub fn at_level(&mut self, level: u8) -> &mut Chunker<S> {
    if level == self.builder.level() {
      return self;
    }
    assert!(level > self.builder.level(), "at_level only ascends toward the root");
    if self.parent.is_none() {
      let next = self.builder.level() + 1;
      self.parent =
        Some(Box::new(Chunker::new(Arc::clone(&self.store), next, self.chunk_config_addr, self.chunk_config)));
    }
    self.parent.as_mut().unwrap().at_level(level)
  }

  fn append_to_parent(&mut self, last_key: &[u8], address: Address, subtree_count: u64) -> Result<()> {
    if self.parent.is_none() {
      let level = self.builder.level() + 1;
      self.parent =
        Some(Box::new(Chunker::new(Arc::clone(&self.store), level, self.chunk_config_addr, self.chunk_config)));
    }
    self.parent.as_mut().unwrap().append(last_key, address.as_bytes(), subtree_count)
  }

  /// Finalizes this chunker and every chunker above it, returning the address of the tree's
  /// root.
  ///
  /// A level with exactly one pending item is special-cased two ways, depending on whether
  /// there is anything above it left to combine with:
  /// - If some ancestor still has pending items of its own, this lone item is still written out
  ///   as a genuine (if degenerate) node and forwarded up normally, so it can join its pending
  ///   siblings higher in the tree.
  /// - If nothing above it is pending either, writing it out would leave a single-child spine
  ///   sitting on top of the real content. Instead its child is promoted directly: the final
  ///   root is found by walking down through however many such single-child links remain until
  ///   hitting a leaf or a node with more than one item.
  pub fn done(mut self) -> Result<Address> {
    let parent_pending = self.parent.as_deref().map(Chunker::any_pending).unwrap_or(false);

    if parent_pending {
      if self.builder.count() > 0 {
        let node = self.builder.build();
        let last_key = node.last_key().expect("a non-empty builder produces a node with a last key").to_vec();
        let subtree_count = node.total_count();
        let address = self.store.write_node(&node)?;
        self.append_to_parent(&last_key, address, subtree_count)?;
      }
      return self.parent.take().expect("parent_pending implies a parent chunker exists").done();
    }

    if self.builder.count() == 0 {
      return match self.parent.take() {
        Some(parent) => parent.done(),
        None => {
          let empty = NodeBuilder::new(self.builder.level(), self.chunk_config_addr).build();
          self.store.write_node(&empty)
        }
      };
    }

    if self.builder.level() == 0 || self.builder.count() > 1 {
      let node = self.builder.build();
      return self.store.write_node(&node);
    }

    let node = self.builder.build();
    let mut child_address = node.child_address(0);
    loop {
      let child = self.store.read_node(&child_address)?;
      if child.is_leaf() || child.item_count() > 1 {
        return Ok(child_address);
      }
      child_address = child.child_address(0);
    }
  }
}
