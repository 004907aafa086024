//! Forward iteration over B+tree leaves.

use crate::buffer::{BasicPageGuard, BufferPoolManager};
use crate::common::{PageId, Result, RowId};
use crate::storage::page::{LeafPage, TreePageHeader};

/// Cursor over `(key, row id)` pairs in ascending key order.
///
/// Holds a pin (but no latch) on the current leaf. Reaching the end of a
/// leaf releases it and pins the next one; past the last leaf the iterator
/// equals [`BPlusTree::end`](super::BPlusTree::end).
///
/// # Example
/// ```ignore
/// for entry in tree.begin()? {
///     let (key, rid) = entry?;
/// }
/// ```
pub struct IndexIterator<'a> {
    bpm: &'a BufferPoolManager,
    guard: Option<BasicPageGuard<'a>>,
    index: usize,
}

impl<'a> IndexIterator<'a> {
    /// Position at slot `index` of `leaf_id`, skipping ahead if the slot is
    /// past the leaf's last entry.
    pub(crate) fn new(bpm: &'a BufferPoolManager, leaf_id: PageId, index: usize) -> Result<Self> {
        let guard = bpm.fetch_page_basic(leaf_id)?;
        let mut iter = Self {
            bpm,
            guard: Some(guard),
            index,
        };
        iter.skip_exhausted()?;
        Ok(iter)
    }

    pub(crate) fn end(bpm: &'a BufferPoolManager) -> Self {
        Self {
            bpm,
            guard: None,
            index: 0,
        }
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Leaf the cursor is on, `PageId::INVALID` at the end.
    pub fn page_id(&self) -> PageId {
        self.guard
            .as_ref()
            .map_or(PageId::INVALID, |guard| guard.page_id())
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Entry under the cursor without advancing.
    pub fn current(&self) -> Option<(Vec<u8>, RowId)> {
        let guard = self.guard.as_ref()?;
        let page = guard.read();
        let leaf = LeafPage::new(page.as_slice());
        Some((leaf.key_at(self.index).to_vec(), leaf.value_at(self.index)))
    }

    /// Move to the next leaf while the cursor is past the current one.
    fn skip_exhausted(&mut self) -> Result<()> {
        while let Some(guard) = &self.guard {
            let next = {
                let page = guard.read();
                let leaf = LeafPage::new(page.as_slice());
                if self.index < leaf.size() {
                    return Ok(());
                }
                leaf.next_page_id()
            };
            // Release the current pin before taking the next one.
            self.guard = None;
            self.index = 0;
            if next.is_valid() {
                self.guard = Some(self.bpm.fetch_page_basic(next)?);
            }
        }
        Ok(())
    }
}

impl Iterator for IndexIterator<'_> {
    type Item = Result<(Vec<u8>, RowId)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.current()?;
        self.index += 1;
        if let Err(e) = self.skip_exhausted() {
            self.guard = None;
            return Some(Err(e));
        }
        Some(Ok(entry))
    }
}

impl PartialEq for IndexIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.page_id() == other.page_id() && self.index == other.index
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::common::IndexId;
    use crate::index::{ensure_index_roots_page, BPlusTree, BytewiseComparator};
    use crate::storage::DiskManager;
    use tempfile::TempDir;

    fn create_test_tree(pool_size: usize) -> (BPlusTree, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("iter.db")).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
        ensure_index_roots_page(&bpm).unwrap();
        let tree = BPlusTree::new(
            IndexId(3),
            bpm,
            Arc::new(BytewiseComparator),
            4,
            Some(4),
            Some(4),
        )
        .unwrap();
        (tree, dir)
    }

    fn key(n: u32) -> [u8; 4] {
        n.to_be_bytes()
    }

    fn decode(entry: Result<(Vec<u8>, RowId)>) -> u32 {
        let (key, _) = entry.unwrap();
        u32::from_be_bytes(key.try_into().unwrap())
    }

    #[test]
    fn test_empty_tree_begin_is_end() {
        let (tree, _dir) = create_test_tree(8);
        let iter = tree.begin().unwrap();
        assert!(iter.is_end());
        assert!(iter == tree.end());
    }

    #[test]
    fn test_iterates_across_leaves_in_order() {
        let (mut tree, _dir) = create_test_tree(16);
        for n in [9, 3, 7, 1, 5, 8, 2, 6, 4, 0] {
            tree.insert(&key(n), RowId::new(PageId::new(1), n)).unwrap();
        }

        let keys: Vec<u32> = tree.begin().unwrap().map(decode).collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_reaches_end_after_n_steps() {
        let (mut tree, _dir) = create_test_tree(16);
        for n in 0..7 {
            tree.insert(&key(n), RowId::new(PageId::new(1), n)).unwrap();
        }
        let mut iter = tree.begin().unwrap();
        for _ in 0..7 {
            assert!(iter != tree.end());
            iter.next().unwrap().unwrap();
        }
        assert!(iter == tree.end());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_begin_at() {
        let (mut tree, _dir) = create_test_tree(16);
        for n in (0..20).map(|n| n * 2) {
            tree.insert(&key(n), RowId::new(PageId::new(1), n)).unwrap();
        }

        let from_exact: Vec<u32> = tree.begin_at(&key(30)).unwrap().map(decode).collect();
        assert_eq!(from_exact, [30, 32, 34, 36, 38]);

        // Absent key: start at its insertion point, possibly in the next leaf.
        let from_gap: Vec<u32> = tree.begin_at(&key(35)).unwrap().map(decode).collect();
        assert_eq!(from_gap, [36, 38]);

        assert!(tree.begin_at(&key(100)).unwrap().is_end());
    }

    #[test]
    fn test_iterator_releases_pins() {
        let (mut tree, _dir) = create_test_tree(16);
        for n in 0..12 {
            tree.insert(&key(n), RowId::new(PageId::new(1), n)).unwrap();
        }
        {
            let mut iter = tree.begin().unwrap();
            iter.next();
            assert_eq!(tree.buffer_pool().pin_count(iter.page_id()), Some(1));
        }
        assert_eq!(tree.begin().unwrap().count(), 12);
        assert!(tree.buffer_pool().check_all_unpinned());
    }
}
