//! # Node & NodeBuilder
//!
//! A [`Node`] is the immutable, content-addressed unit of persistence. A [`NodeBuilder`]
//! accumulates `(key, value, subtree_count)` triples and materializes a `Node` once a chunk
//! boundary fires or the tree is finalized.

use crate::address::{Address, ADDRESS_LEN};
use crate::codec;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Hard ceiling on a node's serialized key+value content: 64 KiB - 1.
pub const MAX_NODE_SIZE: usize = u16::MAX as usize;

/// The leaf-or-internal payload of a [`Node`]. Internal nodes carry links, never values; leaves
/// carry values, never links.
#[derive(Clone, Debug, PartialEq)]
pub enum NodePayload {
  /// Leaf payload: one value per key.
  Leaf(Vec<Box<[u8]>>),
  /// Internal payload: one child address and one subtree count per key.
  Internal { links: Vec<Address>, subtree_counts: Vec<u64> },
}

/// An immutable, content-addressed tree node.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
  level: u8,
  keys: Vec<Box<[u8]>>,
  payload: NodePayload,
  chunk_config: Address,
}

impl Node {
  /// `0` for a leaf; one more than its children's level for an internal node.
  pub fn level(&self) -> u8 {
    self.level
  }

  /// `true` iff this is a leaf (`level() == 0`).
  pub fn is_leaf(&self) -> bool {
    self.level == 0
  }

  /// Number of key-value (or key-link) pairs in this node.
  pub fn item_count(&self) -> usize {
    self.keys.len()
  }

  /// The address of the chunk configuration that produced this node.
  pub fn chunk_config(&self) -> Address {
    self.chunk_config
  }

  /// The key at `index`.
  pub fn key(&self, index: usize) -> &[u8] {
    &self.keys[index]
  }

  /// The last (largest) key in this node, or `None` if it is empty.
  pub fn last_key(&self) -> Option<&[u8]> {
    self.keys.last().map(|k| &k[..])
  }

  /// The leaf value at `index`. Panics if this is not a leaf.
  pub fn leaf_value(&self, index: usize) -> &[u8] {
    match &self.payload {
      NodePayload::Leaf(values) => &values[index],
      NodePayload::Internal { .. } => panic!("leaf_value called on an internal node"),
    }
  }

  /// The child address at `index`. Panics if this is a leaf.
  pub fn child_address(&self, index: usize) -> Address {
    match &self.payload {
      NodePayload::Internal { links, .. } => links[index],
      NodePayload::Leaf(_) => panic!("child_address called on a leaf node"),
    }
  }

  /// The subtree count for the child at `index`; leaves implicitly carry `1` per item.
  pub fn subtree_count(&self, index: usize) -> u64 {
    match &self.payload {
      NodePayload::Internal { subtree_counts, .. } => subtree_counts[index],
      NodePayload::Leaf(_) => 1,
    }
  }

  /// Sum of all children's subtree counts; for a leaf, its item count.
  pub fn total_count(&self) -> u64 {
    match &self.payload {
      NodePayload::Internal { subtree_counts, .. } => subtree_counts.iter().sum(),
      NodePayload::Leaf(values) => values.len() as u64,
    }
  }

  /// Bytes to feed into a parent chunker for the item at `index`: the value for a leaf, or the
  /// child's address bytes for an internal node.
  pub fn item_bytes(&self, index: usize) -> Vec<u8> {
    match &self.payload {
      NodePayload::Leaf(values) => values[index].to_vec(),
      NodePayload::Internal { links, .. } => links[index].as_bytes().to_vec(),
    }
  }

  /// Canonical encoding of this node.
  pub fn encode(&self) -> Result<Vec<u8>> {
    codec::encode(&NodeWire::from(self))
  }

  /// The content address this node would be stored under.
  pub fn address(&self) -> Result<Address> {
    Ok(Address::of(&self.encode()?))
  }

  /// Decodes a node from its canonical bytes, validating its structural invariants (bad link
  /// length, level/payload mismatch, unsorted keys) and returning `InvalidEncoding` on failure.
  pub fn decode(bytes: &[u8]) -> Result<Node> {
    let wire: NodeWire = codec::decode(bytes)?;
    Node::try_from(wire)
  }
}

/// The wire shape of a [`Node`]. Kept separate from [`Node`] so the in-memory type can use a Rust
/// enum for leaf/internal while the wire format stays a flat, self-describing record.
#[derive(Serialize, Deserialize)]
struct NodeWire {
  level: u8,
  count: u16,
  keys: Vec<ByteBuf>,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  values: Option<Vec<ByteBuf>>,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  links: Option<Vec<[u8; ADDRESS_LEN]>>,
  #[serde(skip_serializing_if = "Option::is_none", default)]
  subtree_counts: Option<Vec<u64>>,
  chunk_config_link: [u8; ADDRESS_LEN],
}

impl From<&Node> for NodeWire {
  fn from(node: &Node) -> Self {
    let keys = node.keys.iter().map(|k| ByteBuf::from(k.to_vec())).collect();
    let (values, links, subtree_counts) = match &node.payload {
      NodePayload::Leaf(values) => {
        let values = values.iter().map(|v| ByteBuf::from(v.to_vec())).collect();
        (Some(values), None, None)
      }
      NodePayload::Internal { links, subtree_counts } => {
        let links = links.iter().map(|a| *a.as_bytes()).collect();
        (None, Some(links), Some(subtree_counts.clone()))
      }
    };
    NodeWire {
      level: node.level,
      count: node.keys.len() as u16,
      keys,
      values,
      links,
      subtree_counts,
      chunk_config_link: *node.chunk_config.as_bytes(),
    }
  }
}

impl TryFrom<NodeWire> for Node {
  type Error = Error;

  fn try_from(wire: NodeWire) -> Result<Node> {
    if wire.keys.len() != wire.count as usize {
      return Err(Error::invalid_encoding("key count does not match declared count"));
    }
    for window in wire.keys.windows(2) {
      if window[0].as_slice() >= window[1].as_slice() {
        return Err(Error::invalid_encoding("keys are not strictly increasing"));
      }
    }

    let keys: Vec<Box<[u8]>> = wire.keys.iter().map(|k| k.to_vec().into_boxed_slice()).collect();

    let payload = if wire.level == 0 {
      let values = wire.values.ok_or_else(|| Error::invalid_encoding("leaf node missing values"))?;
      if wire.links.is_some() || wire.subtree_counts.is_some() {
        return Err(Error::invalid_encoding("leaf node carries internal-only fields"));
      }
      if values.len() != keys.len() {
        return Err(Error::invalid_encoding("value count does not match key count"));
      }
      NodePayload::Leaf(values.into_iter().map(|v| v.into_vec().into_boxed_slice()).collect())
    } else {
      let links = wire.links.ok_or_else(|| Error::invalid_encoding("internal node missing links"))?;
      let subtree_counts =
        wire.subtree_counts.ok_or_else(|| Error::invalid_encoding("internal node missing subtree counts"))?;
      if wire.values.is_some() {
        return Err(Error::invalid_encoding("internal node carries leaf-only values"));
      }
      if links.len() != keys.len() || subtree_counts.len() != keys.len() {
        return Err(Error::invalid_encoding("link/subtree count does not match key count"));
      }
      if keys.is_empty() {
        return Err(Error::invalid_encoding("internal node has no children"));
      }
      let links = links.into_iter().map(Address::from_bytes).collect();
      NodePayload::Internal { links, subtree_counts }
    };

    Ok(Node { level: wire.level, keys, payload, chunk_config: Address::from_bytes(wire.chunk_config_link) })
  }
}

/// Accumulates `(key, value, subtree_count)` triples for a single level until a chunk boundary
/// fires, then materializes an immutable [`Node`].
pub struct NodeBuilder {
  level: u8,
  chunk_config: Address,
  keys: Vec<Box<[u8]>>,
  payloads: Vec<Box<[u8]>>,
  subtree_counts: Vec<u64>,
  size: usize,
}

impl NodeBuilder {
  /// Creates an empty builder for the given level and chunk configuration.
  pub fn new(level: u8, chunk_config: Address) -> Self {
    NodeBuilder { level, chunk_config, keys: Vec::new(), payloads: Vec::new(), subtree_counts: Vec::new(), size: 0 }
  }

  /// The level this builder accumulates items for.
  pub fn level(&self) -> u8 {
    self.level
  }

  /// Number of items accumulated so far.
  pub fn count(&self) -> usize {
    self.keys.len()
  }

  /// Whether appending `(key, value)` would keep the serialized size within
  /// [`MAX_NODE_SIZE`].
  pub fn has_capacity(&self, key: &[u8], value: &[u8]) -> bool {
    self.size + key.len() + value.len() <= MAX_NODE_SIZE
  }

  /// Appends an item to the builder, in order.
  pub fn add_item(&mut self, key: &[u8], value: &[u8], subtree_count: u64) {
    self.size += key.len() + value.len();
    self.keys.push(key.to_vec().into_boxed_slice());
    self.payloads.push(value.to_vec().into_boxed_slice());
    self.subtree_counts.push(subtree_count);
  }

  /// Materializes a [`Node`] from the accumulated items and resets the builder's state for
  /// reuse. Link-length validation for internal nodes panics rather than returning an error,
  /// since well-formed link bytes are an invariant the chunker itself must uphold, not
  /// externally supplied data.
  pub fn build(&mut self) -> Node {
    let keys = std::mem::take(&mut self.keys);
    let payloads = std::mem::take(&mut self.payloads);
    let subtree_counts = std::mem::take(&mut self.subtree_counts);
    self.size = 0;

    let payload = if self.level == 0 {
      NodePayload::Leaf(payloads)
    } else {
      let links = payloads
        .into_iter()
        .map(|bytes| {
          let array: [u8; ADDRESS_LEN] =
            bytes.as_ref().try_into().unwrap_or_else(|_| panic!("wrong link length: {} bytes", bytes.len()));
          Address::from_bytes(array)
        })
        .collect();
      NodePayload::Internal { links, subtree_counts }
    };

    Node { level: self.level, keys, payload, chunk_config: self.chunk_config }
  }
}
