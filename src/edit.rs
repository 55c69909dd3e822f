//! # Edits and staging
//!
//! Mutations are expressed as a sorted stream of [`Edit`]s fed to
//! [`crate::mutator::apply_mutations`]. [`StagingBuffer`] is where callers accumulate edits
//! in-memory (keyed so repeated writes to the same key collapse to the last one) before they are
//! applied as a batch; [`MutableTree`] pairs a staging buffer with the persisted root it stages
//! changes against.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::config::ChunkConfig;
use crate::error::Result;
use crate::node_store::NodeStore;
use crate::static_tree::StaticTree;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single staged change to a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
  /// Set `key` to `value`, inserting or overwriting.
  Put(Vec<u8>, Vec<u8>),
  /// Remove `key`, a no-op if it is not present.
  Delete(Vec<u8>),
}

impl Edit {
  /// The key this edit applies to.
  pub fn key(&self) -> &[u8] {
    match self {
      Edit::Put(key, _) => key,
      Edit::Delete(key) => key,
    }
  }
}

/// An in-memory, key-deduplicated holding area for edits not yet applied to a tree. Stands in
/// for the ordered side-buffer a full system would keep on disk (e.g. a skiplist WAL) -- out of
/// scope here, but the interface above it (accumulate, then flush as a sorted batch) is the same
/// shape.
#[derive(Default)]
pub struct StagingBuffer {
  pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl StagingBuffer {
  /// An empty staging buffer.
  pub fn new() -> Self {
    StagingBuffer::default()
  }

  /// Stages a put, overwriting any previously staged edit for the same key.
  pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
    self.pending.insert(key.into(), Some(value.into()));
  }

  /// Stages a delete, overwriting any previously staged edit for the same key.
  pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
    self.pending.insert(key.into(), None);
  }

  /// The staged edit for `key`, if any: `Some(Some(value))` for a pending put, `Some(None)` for
  /// a pending delete, `None` if `key` has no staged edit.
  pub fn get(&self, key: &[u8]) -> Option<Option<&[u8]>> {
    self.pending.get(key).map(|v| v.as_deref())
  }

  /// Whether any edits are staged.
  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  /// Discards all staged edits.
  pub fn clear(&mut self) {
    self.pending.clear();
  }

  /// Iterates staged edits by ascending key, the order [`crate::mutator`] expects.
  pub fn edits(&self) -> impl Iterator<Item = Edit> + '_ {
    self.pending.iter().map(|(key, value)| match value {
      Some(value) => Edit::Put(key.clone(), value.clone()),
      None => Edit::Delete(key.clone()),
    })
  }
}

/// A persisted root paired with a [`StagingBuffer`] of not-yet-applied edits.
pub struct MutableTree<S: BlockStore> {
  store: Arc<NodeStore<S>>,
  chunk_config_addr: Address,
  chunk_config: ChunkConfig,
  root: Address,
  staged: StagingBuffer,
}

impl<S: BlockStore> MutableTree<S> {
  /// Wraps the tree rooted at `root`, staging edits against `chunk_config`.
  pub fn new(store: Arc<NodeStore<S>>, chunk_config_addr: Address, chunk_config: ChunkConfig, root: Address) -> Self {
    MutableTree { store, chunk_config_addr, chunk_config, root, staged: StagingBuffer::new() }
  }

  /// The tree's current persisted root. Staged-but-unapplied edits are not reflected here.
  pub fn root(&self) -> Address {
    self.root
  }

  /// Stages a put.
  pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
    self.staged.put(key, value);
  }

  /// Stages a delete.
  pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
    self.staged.delete(key);
  }

  /// Whether any edits are staged but not yet applied.
  pub fn has_pending(&self) -> bool {
    !self.staged.is_empty()
  }

  /// Looks up `key`, checking staged edits first and falling back to the persisted tree.
  pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match self.staged.get(key) {
      Some(Some(value)) => Ok(Some(value.to_vec())),
      Some(None) => Ok(None),
      None => StaticTree::new(Arc::clone(&self.store), self.root).get(key),
    }
  }

  /// Applies every staged edit as a single batch, producing a new root and clearing the
  /// staging buffer. A no-op (returns the current root unchanged) if nothing is staged.
  pub fn apply_pending(&mut self) -> Result<Address> {
    if self.staged.is_empty() {
      return Ok(self.root);
    }
    let edits: Vec<Edit> = self.staged.edits().collect();
    let new_root = crate::mutator::apply_mutations(
      Arc::clone(&self.store),
      self.chunk_config_addr,
      self.chunk_config,
      self.root,
      &edits,
    )?;
    self.root = new_root;
    self.staged.clear();
    Ok(new_root)
  }

  /// A read-only view of the tree as it stands after the last [`Self::apply_pending`] call.
  pub fn static_view(&self) -> StaticTree<S> {
    StaticTree::new(Arc::clone(&self.store), self.root)
  }
}
