//! # Merge
//!
//! [`merge`] computes the edits that turn `base` into `new`, and replays them onto `target`.
//! Diffing and applying run as two cooperating threads joined by a bounded channel: the differ
//! thread can be several subtrees ahead of the mutator consuming its output, but the channel's
//! capacity caps how far ahead it is allowed to get, so a merge over a huge tree doesn't have to
//! buffer the entire diff in memory before applying any of it.

use crate::address::Address;
use crate::block_store::BlockStore;
use crate::cancel::CancellationToken;
use crate::config::ChunkConfig;
use crate::differ::{Diff, Differ};
use crate::edit::Edit;
use crate::error::Result;
use crate::mutator::apply_mutations_streaming;
use crate::node_store::NodeStore;
use std::sync::Arc;

/// Channel capacity between the differ and mutator threads. Large enough that the mutator
/// rarely stalls waiting on the differ, small enough that the differ can't run arbitrarily far
/// ahead and balloon memory on a merge with a huge diff.
const CHANNEL_CAPACITY: usize = 1024;

/// Computes the diff from `base` to `new` and applies it to `target`, returning the new root.
/// Equivalent to (but far cheaper than) collecting every `Diff` into a `Vec` and calling
/// [`crate::mutator::apply_mutations`] with it.
pub fn merge<S: BlockStore + 'static>(
  store: Arc<NodeStore<S>>,
  chunk_config_addr: Address,
  chunk_config: ChunkConfig,
  base: Address,
  new: Address,
  target: Address,
) -> Result<Address> {
  merge_with_cancellation(store, chunk_config_addr, chunk_config, base, new, target, CancellationToken::new())
}

/// Like [`merge`], but the caller supplies a [`CancellationToken`] it can trip from elsewhere
/// (e.g. a timeout) to stop both threads early.
pub fn merge_with_cancellation<S: BlockStore + 'static>(
  store: Arc<NodeStore<S>>,
  chunk_config_addr: Address,
  chunk_config: ChunkConfig,
  base: Address,
  new: Address,
  target: Address,
  cancel: CancellationToken,
) -> Result<Address> {
  let (sender, receiver) = crossbeam_channel::bounded::<Result<Edit>>(CHANNEL_CAPACITY);
  let differ_store = Arc::clone(&store);
  let differ_cancel = cancel.clone();

  let handle = std::thread::spawn(move || {
    let differ = match Differ::from_roots(differ_store, base, new) {
      Ok(differ) => differ.with_cancellation(differ_cancel),
      Err(e) => {
        let _ = sender.send(Err(e));
        return;
      }
    };
    for diff in differ {
      match diff {
        Ok(diff) => {
          let edit = match diff {
            Diff::Added { key, value } => Edit::Put(key, value),
            Diff::Modified { key, new_value, .. } => Edit::Put(key, new_value),
            Diff::Removed { key, .. } => Edit::Delete(key),
          };
          if sender.send(Ok(edit)).is_err() {
            // The mutator side gave up (it hit an error of its own); stop producing.
            break;
          }
        }
        Err(e) => {
          let _ = sender.send(Err(e));
          break;
        }
      }
    }
  });

  let result = apply_mutations_streaming(store, chunk_config_addr, chunk_config, target, receiver.into_iter());
  if result.is_err() {
    // Unblock the differ thread promptly rather than letting it keep diffing a tree nobody is
    // going to finish applying.
    cancel.cancel();
  }
  if handle.join().is_err() {
    tracing::warn!("differ thread panicked during merge");
  }

  result
}
