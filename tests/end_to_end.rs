//! End-to-end scenarios exercising the store the way a caller would: build a tree, stage and
//! apply edits, diff two roots, merge one tree's changes onto another. A handful of fixed
//! scenarios pin down the concrete numbers (building over a handful of pairs vs. tens of
//! thousands, deleting, merging disjoint and overlapping changesets); the `proptest` block below
//! checks that the properties giving the whole design its point -- history independence,
//! idempotent writes, insert-then-delete being a true no-op -- hold over randomized inputs too,
//! not just these fixed cases.

use prolly_store::block_store::MemoryBlockStore;
use prolly_store::chunker::Chunker;
use prolly_store::config::ChunkConfig;
use prolly_store::edit::{Edit, MutableTree};
use prolly_store::merge::merge;
use prolly_store::mutator::apply_mutations;
use prolly_store::node_store::NodeStore;
use prolly_store::static_tree::StaticTree;
use prolly_store::Address;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn new_store() -> (Arc<NodeStore<MemoryBlockStore>>, Address, ChunkConfig) {
  let store = Arc::new(NodeStore::new(MemoryBlockStore::new(), 4096));
  let cfg = ChunkConfig::default_key_hash();
  let cfg_addr = store.write_chunk_config(&cfg).unwrap();
  (store, cfg_addr, cfg)
}

fn empty_root(store: Arc<NodeStore<MemoryBlockStore>>, cfg_addr: Address, cfg: ChunkConfig) -> Address {
  Chunker::new(store, 0, cfg_addr, cfg).done().unwrap()
}

/// Builds a tree from a already-sorted, already-deduplicated set of pairs in a single pass,
/// bypassing the mutator entirely -- used as an independent oracle the mutator-built trees are
/// checked against.
fn build_sorted(
  store: Arc<NodeStore<MemoryBlockStore>>,
  cfg_addr: Address,
  cfg: ChunkConfig,
  pairs: &BTreeMap<Vec<u8>, Vec<u8>>,
) -> Address {
  let mut chunker = Chunker::new(store, 0, cfg_addr, cfg);
  for (key, value) in pairs {
    chunker.append(key, value, 1).unwrap();
  }
  chunker.done().unwrap()
}

#[test]
fn put_get_delete_round_trip_through_mutable_tree() {
  let (store, cfg_addr, cfg) = new_store();
  let root = empty_root(store.clone(), cfg_addr, cfg);
  let mut tree = MutableTree::new(store.clone(), cfg_addr, cfg, root);

  tree.put(b"alpha".to_vec(), b"1".to_vec());
  tree.put(b"beta".to_vec(), b"2".to_vec());
  assert_eq!(tree.get(b"alpha").unwrap(), Some(b"1".to_vec()));
  assert!(tree.has_pending());

  tree.apply_pending().unwrap();
  assert!(!tree.has_pending());

  let view = tree.static_view();
  assert_eq!(view.get(b"alpha").unwrap(), Some(b"1".to_vec()));
  assert_eq!(view.get(b"beta").unwrap(), Some(b"2".to_vec()));
  assert_eq!(view.len().unwrap(), 2);

  tree.delete(b"alpha".to_vec());
  tree.apply_pending().unwrap();
  assert_eq!(tree.static_view().get(b"alpha").unwrap(), None);
  assert_eq!(tree.static_view().len().unwrap(), 1);
}

#[test]
fn history_independence_across_batch_boundaries() {
  let (store, cfg_addr, cfg) = new_store();
  let n = 3_000u32;
  let pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..n).map(|i| (format!("k{:05}", i).into_bytes(), format!("v{:05}", i).into_bytes())).collect();
  let oracle = build_sorted(store.clone(), cfg_addr, cfg, &pairs);

  // Apply the same edits as one single batch.
  let root = empty_root(store.clone(), cfg_addr, cfg);
  let all_at_once: Vec<Edit> = pairs.iter().map(|(k, v)| Edit::Put(k.clone(), v.clone())).collect();
  let root_one_batch = apply_mutations(store.clone(), cfg_addr, cfg, root, &all_at_once).unwrap();

  // Apply the same edits as many small batches, each folded onto the last.
  let mut root_many_batches = root;
  for chunk in all_at_once.chunks(37) {
    root_many_batches = apply_mutations(store.clone(), cfg_addr, cfg, root_many_batches, chunk).unwrap();
  }

  assert_eq!(root_one_batch, oracle);
  assert_eq!(root_many_batches, oracle);
}

#[test]
fn idempotent_put_does_not_change_the_root() {
  let (store, cfg_addr, cfg) = new_store();
  let root = empty_root(store.clone(), cfg_addr, cfg);

  let once = apply_mutations(store.clone(), cfg_addr, cfg, root, &[Edit::Put(b"k".to_vec(), b"v".to_vec())]).unwrap();
  let twice = apply_mutations(store.clone(), cfg_addr, cfg, once, &[Edit::Put(b"k".to_vec(), b"v".to_vec())]).unwrap();
  assert_eq!(once, twice);
}

#[test]
fn insert_then_delete_returns_to_the_original_root() {
  let (store, cfg_addr, cfg) = new_store();
  let pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..500u32).map(|i| (format!("k{:04}", i).into_bytes(), format!("v{:04}", i).into_bytes())).collect();
  let original = build_sorted(store.clone(), cfg_addr, cfg, &pairs);

  let with_extra =
    apply_mutations(store.clone(), cfg_addr, cfg, original, &[Edit::Put(b"zzz-extra".to_vec(), b"x".to_vec())])
      .unwrap();
  assert_ne!(with_extra, original);

  let back = apply_mutations(store.clone(), cfg_addr, cfg, with_extra, &[Edit::Delete(b"zzz-extra".to_vec())])
    .unwrap();
  assert_eq!(back, original, "deleting a freshly-inserted key must reproduce the exact prior root");
}

#[test]
fn merge_of_disjoint_changes_is_commutative() {
  let (store, cfg_addr, cfg) = new_store();
  let pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..1_000u32).map(|i| (format!("k{:05}", i).into_bytes(), format!("v{:05}", i).into_bytes())).collect();
  let base = build_sorted(store.clone(), cfg_addr, cfg, &pairs);

  let left = apply_mutations(
    store.clone(),
    cfg_addr,
    cfg,
    base,
    &[Edit::Put(b"from-left".to_vec(), b"L".to_vec()), Edit::Delete(b"k00010".to_vec())],
  )
  .unwrap();
  let right = apply_mutations(
    store.clone(),
    cfg_addr,
    cfg,
    base,
    &[Edit::Put(b"from-right".to_vec(), b"R".to_vec()), Edit::Delete(b"k00020".to_vec())],
  )
  .unwrap();

  // Merge left's changes onto right, and right's changes onto left: since the two sides never
  // touched the same key, both orders must land on the same final content.
  let merged_lr = merge(store.clone(), cfg_addr, cfg, base, left, right).unwrap();
  let merged_rl = merge(store.clone(), cfg_addr, cfg, base, right, left).unwrap();
  assert_eq!(merged_lr, merged_rl);

  let tree = StaticTree::new(store, merged_lr);
  assert_eq!(tree.get(b"from-left").unwrap(), Some(b"L".to_vec()));
  assert_eq!(tree.get(b"from-right").unwrap(), Some(b"R".to_vec()));
  assert_eq!(tree.get(b"k00010").unwrap(), None);
  assert_eq!(tree.get(b"k00020").unwrap(), None);
}

fn dedup_pairs(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> BTreeMap<Vec<u8>, Vec<u8>> {
  pairs.into_iter().collect()
}

/// A tiny splitmix64-based generator for reproducible "random" test fixtures -- deterministic so
/// the same run always exercises the same keys, without pulling in a dependency for it.
struct DeterministicRng(u64);

impl DeterministicRng {
  fn next_u64(&mut self) -> u64 {
    self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = self.0;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
  }

  fn bytes(&mut self, min_len: usize, max_len: usize) -> Vec<u8> {
    let len = min_len + (self.next_u64() as usize % (max_len - min_len + 1));
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
      out.extend_from_slice(&self.next_u64().to_le_bytes());
    }
    out.truncate(len);
    out
  }
}

#[test]
fn scenario_build_over_three_pairs_yields_a_single_leaf() {
  let (store, cfg_addr, cfg) = new_store();
  let pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    [(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())]
      .into_iter()
      .collect();
  let root = build_sorted(store.clone(), cfg_addr, cfg, &pairs);

  let node = store.read_node(&root).unwrap();
  assert!(node.is_leaf());
  assert_eq!(node.item_count(), 3);

  let tree = StaticTree::new(store, root);
  assert_eq!(tree.get(b"a").unwrap(), Some(b"1".to_vec()));
  assert!(!tree.has(b"z").unwrap());
}

#[test]
fn scenario_build_over_ten_thousand_random_pairs_supports_sampled_lookups() {
  let (store, cfg_addr, cfg) = new_store();
  let mut rng = DeterministicRng(0x5EED);
  let pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..10_000).map(|_| (rng.bytes(15, 45), rng.bytes(15, 45))).collect();
  let root = build_sorted(store.clone(), cfg_addr, cfg, &pairs);

  let tree = StaticTree::new(store, root);
  for (key, value) in pairs.iter().take(1_000) {
    assert_eq!(tree.get(key).unwrap(), Some(value.clone()));
    assert!(tree.has(key).unwrap());
  }
}

#[test]
fn scenario_mutate_interleaves_fifty_thousand_fresh_pairs_into_a_hundred_thousand() {
  let (store, cfg_addr, cfg) = new_store();
  let original: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..100_000u32).map(|i| (format!("k{:06}", i * 2).into_bytes(), format!("v{:06}", i * 2).into_bytes())).collect();
  let original_root = build_sorted(store.clone(), cfg_addr, cfg, &original);

  let inserts: Vec<Edit> = (0..50_000u32)
    .map(|i| Edit::Put(format!("k{:06}", i * 2 + 1).into_bytes(), format!("v{:06}", i * 2 + 1).into_bytes()))
    .collect();
  let new_root = apply_mutations(store.clone(), cfg_addr, cfg, original_root, &inserts).unwrap();
  assert_ne!(new_root, original_root);

  let tree = StaticTree::new(store, new_root);
  for (key, value) in &original {
    assert_eq!(tree.get(key).unwrap(), Some(value.clone()));
  }
  for i in 0..50_000u32 {
    let key = format!("k{:06}", i * 2 + 1);
    let expected = format!("v{:06}", i * 2 + 1).into_bytes();
    assert_eq!(tree.get(key.as_bytes()).unwrap(), Some(expected));
  }
}

#[test]
fn scenario_mutate_delete_removes_only_the_targeted_key() {
  let (store, cfg_addr, cfg) = new_store();
  let pairs: BTreeMap<Vec<u8>, Vec<u8>> = [(b"a".to_vec(), b"v".to_vec()), (b"b".to_vec(), b"v".to_vec())]
    .into_iter()
    .collect();
  let root = build_sorted(store.clone(), cfg_addr, cfg, &pairs);

  let after_delete = apply_mutations(store.clone(), cfg_addr, cfg, root, &[Edit::Delete(b"a".to_vec())]).unwrap();
  let tree = StaticTree::new(store, after_delete);
  assert_eq!(tree.get(b"a").unwrap(), None);
  assert_eq!(tree.get(b"b").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn scenario_merge_disjoint_even_and_odd_keysets_unions_to_two_thousand_keys() {
  let (store, cfg_addr, cfg) = new_store();
  let evens: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..1_000u32).map(|i| (format!("k{:05}", i * 2).into_bytes(), b"v".to_vec())).collect();
  let odds: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..1_000u32).map(|i| (format!("k{:05}", i * 2 + 1).into_bytes(), b"v".to_vec())).collect();
  let empty = empty_root(store.clone(), cfg_addr, cfg);
  let a = build_sorted(store.clone(), cfg_addr, cfg, &evens);
  let b = build_sorted(store.clone(), cfg_addr, cfg, &odds);

  let merged = merge(store.clone(), cfg_addr, cfg, empty, b, a).unwrap();
  let tree = StaticTree::new(store, merged);
  assert_eq!(tree.len().unwrap(), 2_000);
  for key in evens.keys().chain(odds.keys()) {
    assert_eq!(tree.get(key).unwrap(), Some(b"v".to_vec()));
  }
}

#[test]
fn scenario_merge_overlap_prefers_the_incoming_sides_value() {
  let (store, cfg_addr, cfg) = new_store();
  let empty = empty_root(store.clone(), cfg_addr, cfg);
  let a_pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..1_000u32).map(|i| (format!("k{:05}", i * 2).into_bytes(), b"v".to_vec())).collect();
  let b_pairs: BTreeMap<Vec<u8>, Vec<u8>> =
    (0..1_500u32).map(|i| (format!("k{:05}", i * 2).into_bytes(), b"w".to_vec())).collect();
  let a = build_sorted(store.clone(), cfg_addr, cfg, &a_pairs);
  let b = build_sorted(store.clone(), cfg_addr, cfg, &b_pairs);

  let merged = merge(store.clone(), cfg_addr, cfg, empty, b, a).unwrap();
  let tree = StaticTree::new(store, merged);
  for i in 0..1_500u32 {
    let key = format!("k{:05}", i * 2);
    assert_eq!(tree.get(key.as_bytes()).unwrap(), Some(b"w".to_vec()));
  }
}

proptest! {
  /// Two trees built from the same key-value set always converge on the same root, regardless
  /// of insertion order -- whether built directly (sorted) or incrementally through staged,
  /// shuffled `MutableTree` edits.
  #[test]
  fn history_independence_holds_for_arbitrary_insertion_order(
    pairs in prop::collection::vec(
      (prop::collection::vec(any::<u8>(), 1..6), prop::collection::vec(any::<u8>(), 0..6)),
      1..150,
    ),
    seed in 0u64..1000,
  ) {
    let unique = dedup_pairs(pairs);
    prop_assume!(!unique.is_empty());

    let (store, cfg_addr, cfg) = new_store();
    let oracle = build_sorted(store.clone(), cfg_addr, cfg, &unique);

    // A cheap deterministic "shuffle": walk the set in an order derived from `seed` rather than
    // insertion order, by rotating the starting point through the sorted key list.
    let keys: Vec<&Vec<u8>> = unique.keys().collect();
    let rotation = (seed as usize) % keys.len();
    let root = empty_root(store.clone(), cfg_addr, cfg);
    let mut tree = MutableTree::new(store.clone(), cfg_addr, cfg, root);
    for i in 0..keys.len() {
      let key = keys[(i + rotation) % keys.len()];
      tree.put(key.to_vec(), unique[key].to_vec());
    }
    tree.apply_pending().unwrap();

    prop_assert_eq!(tree.root(), oracle);
  }

  /// Putting the same key twice in a row, with the same value, never changes the root the
  /// second time.
  #[test]
  fn put_is_idempotent(
    key in prop::collection::vec(any::<u8>(), 1..10),
    value in prop::collection::vec(any::<u8>(), 0..10),
  ) {
    let (store, cfg_addr, cfg) = new_store();
    let root = empty_root(store.clone(), cfg_addr, cfg);
    let once = apply_mutations(store.clone(), cfg_addr, cfg, root, &[Edit::Put(key.clone(), value.clone())]).unwrap();
    let twice = apply_mutations(store.clone(), cfg_addr, cfg, once, &[Edit::Put(key, value)]).unwrap();
    prop_assert_eq!(once, twice);
  }

  /// Inserting a key that was not present, then deleting it, always restores the exact prior
  /// root -- not just an equivalent one.
  #[test]
  fn insert_then_delete_is_a_no_op_on_a_fresh_key(
    existing in prop::collection::vec(
      (prop::collection::vec(any::<u8>(), 1..6), prop::collection::vec(any::<u8>(), 0..6)),
      0..80,
    ),
    new_key in prop::collection::vec(any::<u8>(), 1..6),
    new_value in prop::collection::vec(any::<u8>(), 0..6),
  ) {
    let mut unique = dedup_pairs(existing);
    unique.remove(&new_key);

    let (store, cfg_addr, cfg) = new_store();
    let original = build_sorted(store.clone(), cfg_addr, cfg, &unique);

    let with_extra =
      apply_mutations(store.clone(), cfg_addr, cfg, original, &[Edit::Put(new_key.clone(), new_value)]).unwrap();
    let back = apply_mutations(store.clone(), cfg_addr, cfg, with_extra, &[Edit::Delete(new_key)]).unwrap();
    prop_assert_eq!(back, original);
  }
}
