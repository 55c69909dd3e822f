//! # StaticTree
//!
//! A [`StaticTree`] is a read-only handle on a tree rooted at a particular content address: the
//! narrow public surface (`get`, `has`, cursors) that sits above [`crate::cursor::Cursor`] for
//! callers that just want to query a snapshot. Mutation always goes through
//! [`crate::edit::MutableTree`], which produces a new root rather than changing one in place --
//! a `StaticTree` never changes once constructed.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::node_store::NodeStore;
use std::sync::Arc;

/// A read-only view of the tree rooted at a single content address.
pub struct StaticTree<S: BlockStore> {
  store: Arc<NodeStore<S>>,
  root: Address,
}

impl<S: BlockStore> StaticTree<S> {
  /// Wraps the tree rooted at `root`.
  pub fn new(store: Arc<NodeStore<S>>, root: Address) -> Self {
    StaticTree { store, root }
  }

  /// The root address this view is pinned to.
  pub fn root(&self) -> Address {
    self.root
  }

  /// Looks up `key`, returning its value if present.
  pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let cursor = Cursor::new_at_key(Arc::clone(&self.store), self.root, key)?;
    match cursor.current_key() {
      Some(found) if found == key => Ok(cursor.current_value().map(|v| v.to_vec())),
      _ => Ok(None),
    }
  }

  /// Whether `key` is present.
  pub fn has(&self, key: &[u8]) -> Result<bool> {
    Ok(self.get(key)?.is_some())
  }

  /// Total number of key-value pairs in the tree.
  pub fn len(&self) -> Result<u64> {
    Ok(self.store.read_node(&self.root)?.total_count())
  }

  /// Whether the tree holds no pairs.
  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// A cursor positioned at the first item.
  pub fn cursor_at_start(&self) -> Result<Cursor<S>> {
    Cursor::new_at_start(Arc::clone(&self.store), self.root)
  }

  /// A cursor positioned at the first item with a key `>= key`.
  pub fn cursor_at_key(&self, key: &[u8]) -> Result<Cursor<S>> {
    Cursor::new_at_key(Arc::clone(&self.store), self.root, key)
  }

  /// A cursor positioned one past the last item, used as a walk's stopping bound.
  pub fn cursor_past_end(&self) -> Result<Cursor<S>> {
    Cursor::new_past_end(Arc::clone(&self.store), self.root)
  }
}

impl<S: BlockStore> Clone for StaticTree<S> {
  fn clone(&self) -> Self {
    StaticTree { store: Arc::clone(&self.store), root: self.root }
  }
}
