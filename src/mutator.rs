//! # Mutator
//!
//! [`apply_mutations`] rewrites a tree by walking it with a [`Cursor`] in lock-step with a
//! sorted stream of [`Edit`]s, feeding a fresh [`Chunker`] chain either the original item (when
//! nothing changed) or the edit's replacement. Whole subtrees that lie entirely before the next
//! edit are forwarded to the chunker at their own level rather than walked leaf by leaf, so
//! applying a handful of edits to a huge tree touches only the path near each edit.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::chunker::Chunker;
use crate::config::ChunkConfig;
use crate::cursor::Cursor;
use crate::edit::Edit;
use crate::error::Result;
use crate::node::Node;
use crate::node_store::NodeStore;
use std::sync::Arc;

/// Finds the shallowest ancestor subtree under the cursor's current position that lies entirely
/// before `bound_key` (or, if `bound_key` is `None`, any ancestor subtree at all) -- the
/// largest chunk of the old tree that can be forwarded to the new one untouched.
fn largest_skippable_subtree<S: BlockStore>(
  store: &NodeStore<S>,
  cursor: &Cursor<S>,
  bound_key: Option<&[u8]>,
) -> Result<Option<(usize, Node, Address)>> {
  for depth in 0..cursor.depth().saturating_sub(1) {
    if let Some(child_addr) = cursor.current_child_address(depth) {
      let child = store.read_node(&child_addr)?;
      if let Some(last_key) = child.last_key() {
        let within_bound = bound_key.map(|bound| last_key < bound).unwrap_or(true);
        if within_bound {
          return Ok(Some((depth, child, child_addr)));
        }
      }
    }
  }
  Ok(None)
}

/// Copies everything the cursor currently sees up to (but not including) `bound_key` through to
/// `chunker`, unchanged, advancing `cursor` past it. `bound_key = None` copies through to the
/// end of the tree.
fn copy_through<S: BlockStore>(
  store: &NodeStore<S>,
  chunker: &mut Chunker<S>,
  cursor: &mut Cursor<S>,
  bound_key: Option<&[u8]>,
) -> Result<()> {
  while cursor.is_valid() {
    if let Some(bound) = bound_key {
      if cursor.current_key().expect("cursor is valid") >= bound {
        break;
      }
    }

    if let Some((depth, node, address)) = largest_skippable_subtree(store, cursor, bound_key)? {
      let last_key = node.last_key().expect("a subtree forwarded through is never empty").to_vec();
      let subtree_count = node.total_count();
      chunker.at_level(node.level() + 1).append(&last_key, address.as_bytes(), subtree_count)?;
      cursor.advance_from(depth)?;
      continue;
    }

    let key = cursor.current_key().expect("cursor is valid").to_vec();
    let value = cursor.current_value().expect("cursor is valid").to_vec();
    chunker.append(&key, &value, 1)?;
    cursor.advance()?;
  }
  Ok(())
}

/// Applies `edits` (which must be sorted by key, with at most one edit per key) to the tree
/// rooted at `old_root`, returning the new root. Unaffected subtrees are reused by content
/// address rather than rewritten.
pub fn apply_mutations<S: BlockStore>(
  store: Arc<NodeStore<S>>,
  chunk_config_addr: Address,
  chunk_config: ChunkConfig,
  old_root: Address,
  edits: &[Edit],
) -> Result<Address> {
  apply_mutations_streaming(store, chunk_config_addr, chunk_config, old_root, edits.iter().cloned().map(Ok))
}

/// Like [`apply_mutations`], but consumes edits from an arbitrary fallible iterator rather than
/// a pre-collected, already-sorted slice. This is what [`crate::merge::merge`] uses to apply a
/// [`crate::differ::Differ`]'s output as it arrives over a channel, without buffering the whole
/// diff in memory first. The iterator must still yield edits in strictly increasing key order.
pub fn apply_mutations_streaming<S: BlockStore>(
  store: Arc<NodeStore<S>>,
  chunk_config_addr: Address,
  chunk_config: ChunkConfig,
  old_root: Address,
  edits: impl IntoIterator<Item = Result<Edit>>,
) -> Result<Address> {
  let mut chunker = Chunker::new(Arc::clone(&store), 0, chunk_config_addr, chunk_config);
  let mut cursor = Cursor::new_at_start(Arc::clone(&store), old_root)?;
  let mut any = false;

  for edit in edits {
    let edit = edit?;
    any = true;
    copy_through(&store, &mut chunker, &mut cursor, Some(edit.key()))?;

    let matches_existing = cursor.is_valid() && cursor.current_key() == Some(edit.key());
    match &edit {
      Edit::Put(key, value) => chunker.append(key, value, 1)?,
      Edit::Delete(_) => {}
    }
    if matches_existing {
      cursor.advance()?;
    }
  }

  if !any {
    return Ok(old_root);
  }

  copy_through(&store, &mut chunker, &mut cursor, None)?;
  chunker.done()
}
