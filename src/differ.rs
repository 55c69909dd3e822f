//! # Differ
//!
//! A [`Differ`] walks a base and a new tree in lock-step and yields the [`Diff`]s between them.
//! Whenever an ancestor frame names the same child address on both sides, the whole
//! subtree beneath it is known to be unchanged and both cursors skip past it in one step, rather
//! than walking down to compare every leaf underneath.

use crate::block_store::BlockStore;
use crate::cancel::CancellationToken;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::node_store::NodeStore;
use std::cmp::Ordering;
use std::sync::Arc;

/// A single difference between a base and a new tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Diff {
  /// `key` is present in the new tree but not the base tree.
  Added { key: Vec<u8>, value: Vec<u8> },
  /// `key` is present in the base tree but not the new tree.
  Removed { key: Vec<u8>, value: Vec<u8> },
  /// `key` is present in both trees with different values.
  Modified { key: Vec<u8>, old_value: Vec<u8>, new_value: Vec<u8> },
}

impl Diff {
  /// The key this diff describes.
  pub fn key(&self) -> &[u8] {
    match self {
      Diff::Added { key, .. } => key,
      Diff::Removed { key, .. } => key,
      Diff::Modified { key, .. } => key,
    }
  }
}

/// Whether `cursor` has reached (or passed) `stop`. `stop` is itself a cursor rather than a bare
/// key so a diff can be bounded to a sub-range of a tree, not just the whole thing.
fn reached<S: BlockStore>(cursor: &Cursor<S>, stop: &Cursor<S>) -> bool {
  match stop.current_key() {
    Some(stop_key) => cursor.current_key().map(|k| k >= stop_key).unwrap_or(true),
    None => !cursor.is_valid(),
  }
}

/// Produces the sequence of [`Diff`]s between a base and a new tree.
pub struct Differ<S: BlockStore> {
  base: Cursor<S>,
  new: Cursor<S>,
  base_stop: Cursor<S>,
  new_stop: Cursor<S>,
  cancel: CancellationToken,
}

impl<S: BlockStore> Differ<S> {
  /// Diffs the full key range of the trees rooted at `base_root` and `new_root`. Each stop
  /// cursor is rooted in its own tree -- the base's stop bounds only the base walk, the new's
  /// stop only the new walk -- so a size mismatch between the two trees can never cause one
  /// side's walk to be cut short by the other's bound.
  pub fn from_roots(
    store: Arc<NodeStore<S>>,
    base_root: crate::address::Address,
    new_root: crate::address::Address,
  ) -> Result<Self> {
    let base = Cursor::new_at_start(Arc::clone(&store), base_root)?;
    let new = Cursor::new_at_start(Arc::clone(&store), new_root)?;
    let base_stop = Cursor::new_past_end(Arc::clone(&store), base_root)?;
    let new_stop = Cursor::new_past_end(store, new_root)?;
    Ok(Differ { base, new, base_stop, new_stop, cancel: CancellationToken::new() })
  }

  /// Attaches a cancellation token; subsequent calls to [`Iterator::next`] return
  /// [`Error::Cancelled`] once it trips.
  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// The shallowest depth at which both cursors currently point at the same child address --
  /// the largest subtree that can be skipped in one step because it is provably identical on
  /// both sides.
  fn skip_common_depth(&self) -> Option<usize> {
    let max_depth = self.base.depth().min(self.new.depth()).saturating_sub(1);
    (0..max_depth).find(|&depth| {
      matches!(
        (self.base.current_child_address(depth), self.new.current_child_address(depth)),
        (Some(a), Some(b)) if a == b
      )
    })
  }
}

impl<S: BlockStore> Iterator for Differ<S> {
  type Item = Result<Diff>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if self.cancel.is_cancelled() {
        return Some(Err(Error::Cancelled));
      }

      let base_done = reached(&self.base, &self.base_stop);
      let new_done = reached(&self.new, &self.new_stop);
      if base_done && new_done {
        return None;
      }

      if base_done {
        let key = self.new.current_key().expect("not done means valid").to_vec();
        let value = self.new.current_value().expect("not done means valid").to_vec();
        if let Err(e) = self.new.advance() {
          return Some(Err(e));
        }
        return Some(Ok(Diff::Added { key, value }));
      }

      if new_done {
        let key = self.base.current_key().expect("not done means valid").to_vec();
        let value = self.base.current_value().expect("not done means valid").to_vec();
        if let Err(e) = self.base.advance() {
          return Some(Err(e));
        }
        return Some(Ok(Diff::Removed { key, value }));
      }

      if let Some(depth) = self.skip_common_depth() {
        if let Err(e) = self.base.advance_from(depth) {
          return Some(Err(e));
        }
        if let Err(e) = self.new.advance_from(depth) {
          return Some(Err(e));
        }
        continue;
      }

      let base_key = self.base.current_key().expect("not done means valid");
      let new_key = self.new.current_key().expect("not done means valid");
      match base_key.cmp(new_key) {
        Ordering::Less => {
          let key = base_key.to_vec();
          let value = self.base.current_value().expect("not done means valid").to_vec();
          if let Err(e) = self.base.advance() {
            return Some(Err(e));
          }
          return Some(Ok(Diff::Removed { key, value }));
        }
        Ordering::Greater => {
          let key = new_key.to_vec();
          let value = self.new.current_value().expect("not done means valid").to_vec();
          if let Err(e) = self.new.advance() {
            return Some(Err(e));
          }
          return Some(Ok(Diff::Added { key, value }));
        }
        Ordering::Equal => {
          let key = base_key.to_vec();
          let old_value = self.base.current_value().expect("not done means valid").to_vec();
          let new_value = self.new.current_value().expect("not done means valid").to_vec();
          if let Err(e) = self.base.advance() {
            return Some(Err(e));
          }
          if let Err(e) = self.new.advance() {
            return Some(Err(e));
          }
          if old_value != new_value {
            return Some(Ok(Diff::Modified { key, old_value, new_value }));
          }
          continue;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block_store::MemoryBlockStore;
  use crate::chunker::Chunker;
  use crate::config::ChunkConfig;
  use crate::edit::Edit;
  use crate::mutator::apply_mutations;

  fn build(store: Arc<NodeStore<MemoryBlockStore>>, cfg_addr: crate::address::Address, cfg: ChunkConfig, n: usize) -> crate::address::Address {
    let mut chunker = Chunker::new(store, 0, cfg_addr, cfg);
    for i in 0..n {
      let key = format!("k{:05}", i);
      let value = format!("v{:05}", i);
      chunker.append(key.as_bytes(), value.as_bytes(), 1).unwrap();
    }
    chunker.done().unwrap()
  }

  #[test]
  fn identical_trees_produce_no_diffs() {
    let store = Arc::new(NodeStore::new(MemoryBlockStore::new(), 1024));
    let cfg = ChunkConfig::default_key_hash();
    let cfg_addr = store.write_chunk_config(&cfg).unwrap();
    let root = build(store.clone(), cfg_addr, cfg, 2_000);
    let diffs: Vec<Diff> = Differ::from_roots(store, root, root).unwrap().collect::<Result<_>>().unwrap();
    assert!(diffs.is_empty());
  }

  #[test]
  fn single_put_produces_one_diff() {
    let store = Arc::new(NodeStore::new(MemoryBlockStore::new(), 1024));
    let cfg = ChunkConfig::default_key_hash();
    let cfg_addr = store.write_chunk_config(&cfg).unwrap();
    let base = build(store.clone(), cfg_addr, cfg, 2_000);
    let new = apply_mutations(store.clone(), cfg_addr, cfg, base, &[Edit::Put(b"new-key".to_vec(), b"v".to_vec())]).unwrap();

    let diffs: Vec<Diff> = Differ::from_roots(store, base, new).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(diffs, vec![Diff::Added { key: b"new-key".to_vec(), value: b"v".to_vec() }]);
  }

  #[test]
  fn single_delete_produces_one_diff() {
    let store = Arc::new(NodeStore::new(MemoryBlockStore::new(), 1024));
    let cfg = ChunkConfig::default_key_hash();
    let cfg_addr = store.write_chunk_config(&cfg).unwrap();
    let base = build(store.clone(), cfg_addr, cfg, 2_000);
    let new = apply_mutations(store.clone(), cfg_addr, cfg, base, &[Edit::Delete(b"k00050".to_vec())]).unwrap();

    let diffs: Vec<Diff> = Differ::from_roots(store, base, new).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(diffs, vec![Diff::Removed { key: b"k00050".to_vec(), value: b"v00050".to_vec() }]);
  }

  #[test]
  fn single_modify_produces_one_diff() {
    let store = Arc::new(NodeStore::new(MemoryBlockStore::new(), 1024));
    let cfg = ChunkConfig::default_key_hash();
    let cfg_addr = store.write_chunk_config(&cfg).unwrap();
    let base = build(store.clone(), cfg_addr, cfg, 2_000);
    let new =
      apply_mutations(store.clone(), cfg_addr, cfg, base, &[Edit::Put(b"k00050".to_vec(), b"changed".to_vec())]).unwrap();

    let diffs: Vec<Diff> = Differ::from_roots(store, base, new).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(
      diffs,
      vec![Diff::Modified { key: b"k00050".to_vec(), old_value: b"v00050".to_vec(), new_value: b"changed".to_vec() }]
    );
  }

  #[test]
  fn cancellation_stops_iteration() {
    let store = Arc::new(NodeStore::new(MemoryBlockStore::new(), 1024));
    let cfg = ChunkConfig::default_key_hash();
    let cfg_addr = store.write_chunk_config(&cfg).unwrap();
    let base = build(store.clone(), cfg_addr, cfg, 2_000);
    let new = apply_mutations(store.clone(), cfg_addr, cfg, base, &[Edit::Put(b"z".to_vec(), b"v".to_vec())]).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut differ = Differ::from_roots(store, base, new).unwrap().with_cancellation(cancel);
    assert!(matches!(differ.next(), Some(Err(Error::Cancelled))));
  }
}
