//! A B+tree keyed by rows of a key schema.

use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{IndexId, Result, RowId, StorageConfig};
use crate::index::KeyManager;
use crate::record::{Row, Schema};

use super::{BPlusTree, IndexIterator};

/// Unique index over one or more columns.
///
/// Key rows are encoded with a [`KeyManager`], which also orders the tree,
/// so keys compare field by field rather than by their byte encoding.
///
/// # Example
/// ```ignore
/// let key_schema = table_schema.project(&["id"])?;
/// let mut index = BPlusTreeIndex::new(IndexId(1), bpm, key_schema, &StorageConfig::default())?;
/// index.insert_entry(&Row::new(vec![Field::Int(7)]), rid)?;
/// assert_eq!(index.scan_key(&Row::new(vec![Field::Int(7)]))?, Some(rid));
/// ```
pub struct BPlusTreeIndex {
    tree: BPlusTree,
    key_manager: Arc<KeyManager>,
}

impl BPlusTreeIndex {
    /// Open (or start) the index registered as `index_id`.
    ///
    /// # Errors
    /// See [`BPlusTree::new`].
    pub fn new(
        index_id: IndexId,
        bpm: Arc<BufferPoolManager>,
        key_schema: Schema,
        config: &StorageConfig,
    ) -> Result<Self> {
        let key_manager = Arc::new(KeyManager::for_schema(key_schema));
        let tree = BPlusTree::new(
            index_id,
            bpm,
            key_manager.clone(),
            key_manager.key_size(),
            config.leaf_max_size,
            config.internal_max_size,
        )?;
        Ok(Self { tree, key_manager })
    }

    #[inline]
    pub fn key_manager(&self) -> &KeyManager {
        &self.key_manager
    }

    #[inline]
    pub fn tree(&self) -> &BPlusTree {
        &self.tree
    }

    /// Add `key -> rid`. Returns `Ok(false)` if the key is already indexed.
    pub fn insert_entry(&mut self, key: &Row, rid: RowId) -> Result<bool> {
        let key = self.key_manager.serialize_key(key)?;
        self.tree.insert(&key, rid)
    }

    /// Returns `Ok(false)` if the key is not indexed.
    pub fn remove_entry(&mut self, key: &Row) -> Result<bool> {
        let key = self.key_manager.serialize_key(key)?;
        self.tree.remove(&key)
    }

    /// Row id stored under `key`.
    pub fn scan_key(&self, key: &Row) -> Result<Option<RowId>> {
        let key = self.key_manager.serialize_key(key)?;
        self.tree.get_value(&key)
    }

    pub fn begin(&self) -> Result<IndexIterator<'_>> {
        self.tree.begin()
    }

    /// Iterator at the first key not less than `key`.
    pub fn begin_at(&self, key: &Row) -> Result<IndexIterator<'_>> {
        let key = self.key_manager.serialize_key(key)?;
        self.tree.begin_at(&key)
    }

    pub fn end(&self) -> IndexIterator<'_> {
        self.tree.end()
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.tree.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Error, PageId};
    use crate::index::ensure_index_roots_page;
    use crate::record::{Column, Field};
    use crate::storage::DiskManager;
    use tempfile::TempDir;

    fn create_test_index(config: StorageConfig) -> (BPlusTreeIndex, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("index.db")).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(32, dm));
        ensure_index_roots_page(&bpm).unwrap();
        let key_schema = Schema::new(vec![Column::int("id", 0)]);
        let index = BPlusTreeIndex::new(IndexId(7), bpm, key_schema, &config).unwrap();
        (index, dir)
    }

    fn int_key(v: i32) -> Row {
        Row::new(vec![Field::Int(v)])
    }

    fn rid(slot: u32) -> RowId {
        RowId::new(PageId::new(5), slot)
    }

    #[test]
    fn test_insert_scan_remove() {
        let (mut index, _dir) = create_test_index(StorageConfig::default());
        assert!(index.insert_entry(&int_key(10), rid(1)).unwrap());
        assert!(!index.insert_entry(&int_key(10), rid(2)).unwrap());

        assert_eq!(index.scan_key(&int_key(10)).unwrap(), Some(rid(1)));
        assert_eq!(index.scan_key(&int_key(11)).unwrap(), None);

        assert!(index.remove_entry(&int_key(10)).unwrap());
        assert!(!index.remove_entry(&int_key(10)).unwrap());
        assert!(index.tree().is_empty());
    }

    #[test]
    fn test_orders_by_field_value() {
        let config = StorageConfig::default()
            .with_leaf_max_size(4)
            .with_internal_max_size(4);
        let (mut index, _dir) = create_test_index(config);
        // Little-endian encodings of negatives would sort last bytewise.
        let values = [5, -3, 200, 0, -70, 17, 1 << 20, -1];
        for (slot, v) in values.iter().enumerate() {
            index.insert_entry(&int_key(*v), rid(slot as u32)).unwrap();
        }

        let keys: Vec<i32> = index
            .begin()
            .unwrap()
            .map(|entry| {
                let (key, _) = entry.unwrap();
                match index.key_manager().deserialize_key(&key).unwrap().fields()[0] {
                    Field::Int(v) => v,
                    ref other => panic!("unexpected key field {:?}", other),
                }
            })
            .collect();
        let mut expected = values.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        let at_least_one = index.begin_at(&int_key(1)).unwrap().count();
        assert_eq!(at_least_one, 4);
    }

    #[test]
    fn test_key_schema_mismatch() {
        let (mut index, _dir) = create_test_index(StorageConfig::default());
        let bad = Row::new(vec![Field::Char("x".into())]);
        assert!(matches!(
            index.insert_entry(&bad, rid(0)),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_destroy() {
        let (mut index, _dir) = create_test_index(StorageConfig::default());
        for v in 0..20 {
            index.insert_entry(&int_key(v), rid(v as u32)).unwrap();
        }
        index.destroy().unwrap();
        assert!(index.tree().is_empty());
        assert!(index.begin().unwrap().is_end());
        assert_eq!(index.tree().buffer_pool().allocated_page_count(), 1);
    }
}
