//! # Cursor
//!
//! A [`Cursor`] is a position inside a tree, represented as a chain of frames from the root
//! down to a leaf item. Two cursors over different trees can be compared frame by
//! frame from the root down: if an ancestor frame names the same content address and the same
//! child index in both, the whole subtree beneath it is known to be identical without looking
//! any further -- this is what lets [`crate::differ::Differ`] skip unchanged subtrees wholesale.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::error::Result;
use crate::node::Node;
use crate::node_store::NodeStore;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Clone)]
struct Frame {
  address: Address,
  node: Node,
  index: usize,
}

/// A position inside a tree rooted at a particular content address.
pub struct Cursor<S: BlockStore> {
  store: Arc<NodeStore<S>>,
  /// `frames[0]` is the root; `frames[frames.len() - 1]` is the leaf-level frame.
  frames: Vec<Frame>,
  past_end: bool,
}

impl<S: BlockStore> Clone for Cursor<S> {
  fn clone(&self) -> Self {
    Cursor { store: Arc::clone(&self.store), frames: self.frames.clone(), past_end: self.past_end }
  }
}

/// Returns the first index `i` with `node.key(i) >= key`, or `node.item_count()` if none do.
/// For an internal node (whose keys are each child's maximum key) this is the child to descend
/// into; for a leaf it is the item itself.
fn search(node: &Node, key: &[u8]) -> usize {
  let mut lo = 0usize;
  let mut hi = node.item_count();
  while lo < hi {
    let mid = lo + (hi - lo) / 2;
    if node.key(mid) < key {
      lo = mid + 1;
    } else {
      hi = mid;
    }
  }
  lo
}

impl<S: BlockStore> Cursor<S> {
  /// Positions at the first item in the tree rooted at `root`.
  pub fn new_at_start(store: Arc<NodeStore<S>>, root: Address) -> Result<Self> {
    let mut frames = Vec::new();
    let mut address = root;
    loop {
      let node = store.read_node(&address)?;
      let is_leaf = node.is_leaf();
      let child = if is_leaf { None } else if node.item_count() > 0 { Some(node.child_address(0)) } else { None };
      frames.push(Frame { address, node, index: 0 });
      match child {
        Some(next) => address = next,
        None => break,
      }
    }
    let past_end = frames.last().map(|f| f.node.item_count() == 0).unwrap_or(true);
    Ok(Cursor { store, frames, past_end })
  }

  /// Positions one past the last item in the tree rooted at `root`: a sentinel used to bound a
  /// walk, never itself a valid position.
  pub fn new_past_end(store: Arc<NodeStore<S>>, root: Address) -> Result<Self> {
    let mut frames = Vec::new();
    let mut address = root;
    loop {
      let node = store.read_node(&address)?;
      let is_leaf = node.is_leaf();
      let count = node.item_count();
      if is_leaf {
        frames.push(Frame { address, node, index: count });
        break;
      }
      let last = count.saturating_sub(1);
      let child = if count > 0 { Some(node.child_address(last)) } else { None };
      frames.push(Frame { address, node, index: last });
      match child {
        Some(next) => address = next,
        None => break,
      }
    }
    Ok(Cursor { store, frames, past_end: true })
  }

  /// Positions at the first item with a key `>= key` in the tree rooted at `root`. If no such
  /// item exists, the cursor is positioned past the end.
  pub fn new_at_key(store: Arc<NodeStore<S>>, root: Address, key: &[u8]) -> Result<Self> {
    let mut frames = Vec::new();
    let mut address = root;
    loop {
      let node = store.read_node(&address)?;
      let idx = search(&node, key);
      let is_leaf = node.is_leaf();
      let count = node.item_count();
      if is_leaf {
        let past_end = idx >= count;
        frames.push(Frame { address, node, index: idx });
        return Ok(Cursor { store, frames, past_end });
      }
      if idx >= count {
        frames.push(Frame { address, node, index: count });
        return Ok(Cursor { store, frames, past_end: true });
      }
      let child = node.child_address(idx);
      frames.push(Frame { address, node, index: idx });
      address = child;
    }
  }

  /// Depth of the frame chain (number of levels from root to leaf, inclusive).
  pub fn depth(&self) -> usize {
    self.frames.len()
  }

  /// Whether the cursor is positioned at a real item.
  pub fn is_valid(&self) -> bool {
    !self.past_end
  }

  /// The key at the cursor's current position, or `None` if past the end.
  pub fn current_key(&self) -> Option<&[u8]> {
    if self.past_end {
      return None;
    }
    let leaf = self.frames.last().expect("a cursor always has at least one frame");
    Some(leaf.node.key(leaf.index))
  }

  /// The value at the cursor's current position, or `None` if past the end.
  pub fn current_value(&self) -> Option<&[u8]> {
    if self.past_end {
      return None;
    }
    let leaf = self.frames.last().expect("a cursor always has at least one frame");
    Some(leaf.node.leaf_value(leaf.index))
  }

  /// The content address of the node at frame `depth`, root at `0`.
  pub fn frame_address(&self, depth: usize) -> Option<Address> {
    self.frames.get(depth).map(|f| f.address)
  }

  /// The child address the frame at `depth` currently points to, or `None` if `depth` names a
  /// leaf frame or is past its node's last item.
  pub fn current_child_address(&self, depth: usize) -> Option<Address> {
    let frame = self.frames.get(depth)?;
    if frame.node.is_leaf() || frame.index >= frame.node.item_count() {
      return None;
    }
    Some(frame.node.child_address(frame.index))
  }

  /// Advances the cursor to the next item.
  pub fn advance(&mut self) -> Result<()> {
    self.advance_from(self.frames.len() - 1)
  }

  /// Advances starting at ancestor frame `depth`, as if everything below it had just been
  /// exhausted. Used by the differ to skip over an entire subtree at once once it has confirmed
  /// the subtree is identical on both sides of a diff.
  pub fn advance_from(&mut self, depth: usize) -> Result<()> {
    if self.past_end {
      return Ok(());
    }
    let mut level = depth + 1;
    loop {
      if level == 0 {
        self.past_end = true;
        return Ok(());
      }
      level -= 1;
      self.frames[level].index += 1;
      if self.frames[level].index < self.frames[level].node.item_count() {
        break;
      }
    }
    let mut idx = level;
    while idx + 1 < self.frames.len() {
      let child_address = self.frames[idx].node.child_address(self.frames[idx].index);
      let child_node = self.store.read_node(&child_address)?;
      self.frames[idx + 1] = Frame { address: child_address, node: child_node, index: 0 };
      idx += 1;
    }
    self.past_end = false;
    Ok(())
  }

  /// Compares two cursors' logical positions by current key, treating past-the-end as greater
  /// than every valid position.
  pub fn compare(&self, other: &Self) -> Ordering {
    match (self.current_key(), other.current_key()) {
      (Some(a), Some(b)) => a.cmp(b),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    }
  }
}
