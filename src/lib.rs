//! A persistent, content-addressed, history-independent ordered key-value store built on a
//! probabilistic B-tree.
//!
//! Two trees holding the same key-value pairs always converge on the same node structure and
//! the same root address, no matter what order the pairs were inserted in or how many
//! intermediate edits it took to get there. That property -- history independence -- falls out
//! of deterministic, content-defined chunking: every node's boundaries are a function of its
//! content, never of an insertion counter or a balancing heuristic.
//!
//! The pieces, roughly bottom-up:
//! - [`address`] / [`codec`]: content addressing and canonical encoding.
//! - [`node`] / [`splitter`] / [`chunker`]: how bytes become immutable, content-addressed nodes.
//! - [`block_store`] / [`node_store`]: where nodes actually live.
//! - [`cursor`] / [`static_tree`]: read-only navigation over a tree snapshot.
//! - [`edit`] / [`mutator`]: turning a sorted batch of edits into a new root.
//! - [`differ`] / [`merge`]: comparing two trees and replaying one's changes onto a third.

pub mod address;
pub mod block_store;
pub mod cancel;
pub mod chunker;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod differ;
pub mod edit;
pub mod error;
pub mod merge;
pub mod mutator;
pub mod node;
pub mod node_store;
pub mod splitter;
pub mod static_tree;

pub use address::Address;
pub use config::ChunkConfig;
pub use edit::{Edit, MutableTree};
pub use error::{Error, Result};
pub use static_tree::StaticTree;
