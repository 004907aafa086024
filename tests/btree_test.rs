//! B+tree Tests
//!
//! Whole-tree behavior through the public API: ordered iteration, splits
//! and merges at small fan-outs, persistence, and randomized workloads
//! checked against a `BTreeMap`.

use std::collections::BTreeMap;
use std::sync::Arc;

use ministore::buffer::BufferPoolManager;
use ministore::common::{IndexId, PageId, RowId};
use ministore::index::{ensure_index_roots_page, BPlusTree, BytewiseComparator};
use ministore::storage::DiskManager;
use proptest::prelude::*;
use tempfile::TempDir;

fn create_tree(pool_size: usize, leaf_max: usize, internal_max: usize) -> (BPlusTree, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("btree.db")).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
    ensure_index_roots_page(&bpm).unwrap();
    let tree = BPlusTree::new(
        IndexId(0),
        bpm,
        Arc::new(BytewiseComparator),
        8,
        Some(leaf_max),
        Some(internal_max),
    )
    .unwrap();
    (tree, dir)
}

fn key(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

fn rid(n: u64) -> RowId {
    RowId::new(PageId::new((n / 100) as i32 + 1), (n % 100) as u32)
}

fn scan(tree: &BPlusTree) -> Vec<u64> {
    tree.begin()
        .unwrap()
        .map(|entry| {
            let (k, _) = entry.unwrap();
            u64::from_be_bytes(k.try_into().unwrap())
        })
        .collect()
}

#[test]
fn test_sequential_insert_and_scan() {
    let (mut tree, _dir) = create_tree(64, 4, 5);
    for n in 0..500 {
        assert!(tree.insert(&key(n), rid(n)).unwrap());
    }
    assert_eq!(scan(&tree), (0..500).collect::<Vec<_>>());
    for n in 0..500 {
        assert_eq!(tree.get_value(&key(n)).unwrap(), Some(rid(n)));
    }
    assert!(tree.buffer_pool().check_all_unpinned());
}

#[test]
fn test_reverse_insert_and_interleaved_remove() {
    let (mut tree, _dir) = create_tree(64, 3, 4);
    for n in (0..300).rev() {
        tree.insert(&key(n), rid(n)).unwrap();
    }
    for n in (0..300).step_by(2) {
        assert!(tree.remove(&key(n)).unwrap());
    }
    assert_eq!(scan(&tree), (1..300).step_by(2).collect::<Vec<_>>());
    for n in 0..300 {
        let expected = if n % 2 == 1 { Some(rid(n)) } else { None };
        assert_eq!(tree.get_value(&key(n)).unwrap(), expected);
    }
}

#[test]
fn test_remove_everything_frees_pages() {
    let (mut tree, _dir) = create_tree(64, 4, 4);
    let bpm = tree.buffer_pool().clone();
    for n in 0..200 {
        tree.insert(&key(n * 7 % 200), rid(n)).unwrap();
    }
    assert!(bpm.allocated_page_count() > 10);

    for n in 0..200 {
        assert!(tree.remove(&key(n)).unwrap());
    }
    assert!(tree.is_empty());
    assert!(tree.begin().unwrap().is_end());
    // Only the index roots page is left.
    assert_eq!(bpm.allocated_page_count(), 1);
    assert!(bpm.check_all_unpinned());
}

#[test]
fn test_small_pool_large_tree() {
    // Far more pages than frames: every descent goes through eviction.
    let (mut tree, _dir) = create_tree(8, 4, 4);
    for n in 0..400 {
        tree.insert(&key(n), rid(n)).unwrap();
    }
    assert_eq!(scan(&tree).len(), 400);
    assert!(tree.buffer_pool().stats().snapshot().evictions > 0);
}

#[test]
fn test_two_trees_share_one_pool() {
    let (mut first, _dir) = create_tree(32, 4, 4);
    let bpm = first.buffer_pool().clone();
    let mut second = BPlusTree::new(
        IndexId(1),
        bpm,
        Arc::new(BytewiseComparator),
        8,
        Some(4),
        Some(4),
    )
    .unwrap();

    for n in 0..50 {
        first.insert(&key(n), rid(n)).unwrap();
        second.insert(&key(n + 1000), rid(n)).unwrap();
    }
    assert_ne!(first.root_page_id(), second.root_page_id());
    assert_eq!(scan(&first), (0..50).collect::<Vec<_>>());
    assert_eq!(scan(&second), (1000..1050).collect::<Vec<_>>());

    second.destroy().unwrap();
    assert_eq!(scan(&first).len(), 50);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Random inserts and removes agree with a `BTreeMap` model.
    #[test]
    fn prop_matches_btreemap(
        ops in prop::collection::vec((any::<bool>(), 0u64..400), 1..600),
        leaf_max in 2usize..8,
        internal_max in 4usize..8,
    ) {
        let (mut tree, _dir) = create_tree(64, leaf_max, internal_max);
        let mut model = BTreeMap::new();

        for (insert, n) in ops {
            if insert {
                let fresh = !model.contains_key(&n);
                prop_assert_eq!(tree.insert(&key(n), rid(n)).unwrap(), fresh);
                model.insert(n, rid(n));
            } else {
                let present = model.remove(&n).is_some();
                prop_assert_eq!(tree.remove(&key(n)).unwrap(), present);
            }
        }

        prop_assert_eq!(scan(&tree), model.keys().copied().collect::<Vec<_>>());
        for (n, value) in &model {
            prop_assert_eq!(tree.get_value(&key(*n)).unwrap(), Some(*value));
        }
        prop_assert_eq!(tree.is_empty(), model.is_empty());
        prop_assert!(tree.buffer_pool().check_all_unpinned());
    }

    /// A range scan from any key yields exactly the model's tail.
    #[test]
    fn prop_begin_at_matches_range(
        keys in prop::collection::btree_set(0u64..1000, 0..200),
        start in 0u64..1000,
    ) {
        let (mut tree, _dir) = create_tree(64, 4, 4);
        for &n in &keys {
            tree.insert(&key(n), rid(n)).unwrap();
        }

        let got: Vec<u64> = tree
            .begin_at(&key(start))
            .unwrap()
            .map(|entry| u64::from_be_bytes(entry.unwrap().0.try_into().unwrap()))
            .collect();
        let expected: Vec<u64> = keys.range(start..).copied().collect();
        prop_assert_eq!(got, expected);
    }
}
