//! # Block store
//!
//! A [`BlockStore`] is the narrow durability seam the rest of the crate is built against: get a
//! block by its content address, put a block under its content address, check whether a block
//! exists. Everything above this layer ([`crate::node_store::NodeStore`] and up) is agnostic to
//! where bytes actually live. Two implementations are provided: an in-memory one for tests and
//! embedding, and a file-backed one for real persistence.

use crate::address::Address;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Content-addressed block storage. Implementations must be safe to share across threads: the
/// merger drives a differ and a mutator concurrently, both of which read and write through the
/// same store.
pub trait BlockStore: Send + Sync {
  /// Fetches the bytes stored under `address`, or [`Error::NotFound`] if there are none.
  fn get(&self, address: &Address) -> Result<Vec<u8>>;

  /// Stores `bytes` under `address`. Writing the same bytes under the same address twice is a
  /// no-op from the caller's perspective -- content addressing makes puts naturally idempotent.
  fn put(&self, address: &Address, bytes: &[u8]) -> Result<()>;

  /// Whether a block exists under `address`, without fetching it.
  fn has(&self, address: &Address) -> Result<bool>;
}

/// An in-memory [`BlockStore`], useful for tests and for trees that never need to outlive the
/// process.
#[derive(Clone, Default)]
pub struct MemoryBlockStore {
  blocks: Arc<Mutex<HashMap<Address, Vec<u8>>>>,
}

impl MemoryBlockStore {
  /// Creates an empty store.
  pub fn new() -> Self {
    MemoryBlockStore::default()
  }

  /// Number of blocks currently held.
  pub fn len(&self) -> usize {
    self.blocks.lock().unwrap().len()
  }

  /// Whether the store holds no blocks.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl BlockStore for MemoryBlockStore {
  fn get(&self, address: &Address) -> Result<Vec<u8>> {
    self.blocks.lock().unwrap().get(address).cloned().ok_or(Error::NotFound)
  }

  fn put(&self, address: &Address, bytes: &[u8]) -> Result<()> {
    self.blocks.lock().unwrap().entry(*address).or_insert_with(|| bytes.to_vec());
    Ok(())
  }

  fn has(&self, address: &Address) -> Result<bool> {
    Ok(self.blocks.lock().unwrap().contains_key(address))
  }
}

/// A file-backed [`BlockStore`]. Blocks are laid out the way git lays out loose objects: the
/// first byte of the address hex-names a subdirectory, keeping any one directory from holding
/// an unbounded number of entries. Writes go to a temp file in the same directory, locked
/// exclusively for the duration of the write, then renamed into place so a reader never
/// observes a partially written block.
pub struct FileBlockStore {
  root: PathBuf,
}

impl FileBlockStore {
  /// Opens (creating if necessary) a file-backed store rooted at `root`.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let root = root.into();
    fs::create_dir_all(&root)?;
    Ok(FileBlockStore { root })
  }

  fn path_for(&self, address: &Address) -> PathBuf {
    let hex = address.to_string();
    self.root.join(&hex[..2]).join(&hex[2..])
  }
}

impl BlockStore for FileBlockStore {
  fn get(&self, address: &Address) -> Result<Vec<u8>> {
    let path = self.path_for(address);
    tracing::trace!(%address, ?path, "block_store.get");
    match fs::read(&path) {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
      Err(e) => Err(Error::StoreIo(e)),
    }
  }

  fn put(&self, address: &Address, bytes: &[u8]) -> Result<()> {
    let path = self.path_for(address);
    if path.exists() {
      return Ok(());
    }
    let dir = path.parent().expect("path_for always nests under a subdirectory");
    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(".{}.tmp", address));
    let tmp = fs::OpenOptions::new().create(true).truncate(true).write(true).open(&tmp_path)?;
    tmp.lock_exclusive()?;
    fs::write(&tmp_path, bytes)?;
    FileExt::unlock(&tmp)?;
    fs::rename(&tmp_path, &path)?;
    tracing::trace!(%address, ?path, len = bytes.len(), "block_store.put");
    Ok(())
  }

  fn has(&self, address: &Address) -> Result<bool> {
    Ok(self.path_for(address).exists())
  }
}
