//! Storage engine: one database file, one buffer pool, and the trees and
//! heaps built on them.

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::buffer::BufferPoolManager;
use crate::common::{IndexId, PageId, Result, StorageConfig};
use crate::index::{ensure_index_roots_page, BPlusTree, BPlusTreeIndex, KeyComparator};
use crate::record::Schema;
use crate::storage::{DiskManager, TableHeap};

/// Entry point tying the storage components together.
///
/// Trees and heaps handed out by the engine share its pool through an
/// `Arc`, so they may outlive the engine value itself.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ministore::record::{Column, Field, Row, Schema};
/// use ministore::{IndexId, StorageConfig, StorageEngine};
///
/// let engine = StorageEngine::open("people.db", StorageConfig::default())?;
/// let schema = Arc::new(Schema::new(vec![Column::int("id", 0)]));
///
/// let mut table = engine.create_table(schema.clone())?;
/// let mut index = engine.open_index(IndexId(1), schema.project(&["id"])?)?;
///
/// let mut row = Row::new(vec![Field::Int(42)]);
/// let rid = table.insert_tuple(&mut row)?;
/// index.insert_entry(&row, rid)?;
///
/// engine.close()?;
/// # Ok::<(), ministore::Error>(())
/// ```
pub struct StorageEngine {
    bpm: Arc<BufferPoolManager>,
    config: StorageConfig,
}

impl StorageEngine {
    /// Open the database at `path`, creating it if it does not exist.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` fails validation
    /// - `Error::Corruption` if the file's meta page is damaged
    /// - `Error::Io` on file errors
    pub fn open<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let disk_manager = DiskManager::open_or_create(path)?;
        let bpm = Arc::new(BufferPoolManager::new(config.pool_size, disk_manager));
        ensure_index_roots_page(&bpm)?;
        info!(
            "opened {} ({} frames, {} pages allocated)",
            path.display(),
            config.pool_size,
            bpm.allocated_page_count()
        );
        Ok(Self { bpm, config })
    }

    #[inline]
    pub fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    #[inline]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Open the tree registered as `index_id` over raw `key_size`-byte keys.
    pub fn open_tree(
        &self,
        index_id: IndexId,
        key_size: usize,
        comparator: Arc<dyn KeyComparator>,
    ) -> Result<BPlusTree> {
        BPlusTree::new(
            index_id,
            self.bpm.clone(),
            comparator,
            key_size,
            self.config.leaf_max_size,
            self.config.internal_max_size,
        )
    }

    /// Open the row-keyed index registered as `index_id`.
    pub fn open_index(&self, index_id: IndexId, key_schema: Schema) -> Result<BPlusTreeIndex> {
        BPlusTreeIndex::new(index_id, self.bpm.clone(), key_schema, &self.config)
    }

    pub fn create_table(&self, schema: Arc<Schema>) -> Result<TableHeap> {
        TableHeap::create(self.bpm.clone(), schema)
    }

    pub fn open_table(&self, first_page_id: PageId, schema: Arc<Schema>) -> Result<TableHeap> {
        TableHeap::open(self.bpm.clone(), first_page_id, schema)
    }

    /// Write back every dirty page and sync the file.
    ///
    /// Dropping the engine flushes too, but swallows errors.
    pub fn close(self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.bpm.sync()?;
        info!("closed ({})", self.bpm.stats().snapshot());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Error, RowId};
    use crate::index::BytewiseComparator;
    use crate::record::{Column, Field, Row};

    #[test]
    fn test_open_bootstraps_roots_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.db");

        let engine = StorageEngine::open(&path, StorageConfig::default()).unwrap();
        assert_eq!(engine.bpm().allocated_page_count(), 1);
        assert!(!engine.bpm().is_page_free(PageId::new(0)));
        engine.close().unwrap();

        let engine = StorageEngine::open(&path, StorageConfig::default()).unwrap();
        assert_eq!(engine.bpm().allocated_page_count(), 1);
    }

    #[test]
    fn test_open_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::default().with_pool_size(0);
        assert!(matches!(
            StorageEngine::open(dir.path().join("bad.db"), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_tree_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.db");
        let config = StorageConfig::default()
            .with_pool_size(16)
            .with_leaf_max_size(4)
            .with_internal_max_size(4);

        {
            let engine = StorageEngine::open(&path, config).unwrap();
            let mut tree = engine
                .open_tree(IndexId(2), 4, Arc::new(BytewiseComparator))
                .unwrap();
            for n in 0u32..50 {
                tree.insert(&n.to_be_bytes(), RowId::new(PageId::new(9), n))
                    .unwrap();
            }
            drop(tree);
            engine.close().unwrap();
        }

        let engine = StorageEngine::open(&path, config).unwrap();
        let tree = engine
            .open_tree(IndexId(2), 4, Arc::new(BytewiseComparator))
            .unwrap();
        assert!(!tree.is_empty());
        for n in 0u32..50 {
            assert_eq!(
                tree.get_value(&n.to_be_bytes()).unwrap(),
                Some(RowId::new(PageId::new(9), n))
            );
        }
        assert_eq!(tree.begin().unwrap().count(), 50);
    }

    #[test]
    fn test_index_reopened_with_changed_key_schema() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::open(dir.path().join("keys.db"), StorageConfig::default())
            .unwrap();
        let narrow = Schema::new(vec![Column::int("id", 0)]);
        let wide = Schema::new(vec![Column::int("id", 0), Column::int("rev", 1)]);
        {
            let mut index = engine.open_index(IndexId(3), narrow.clone()).unwrap();
            let key = Row::new(vec![Field::Int(1)]);
            assert!(index
                .insert_entry(&key, RowId::new(PageId::new(5), 0))
                .unwrap());
        }

        assert!(matches!(
            engine.open_index(IndexId(3), wide),
            Err(Error::InvalidConfig(_))
        ));
        assert!(engine.open_index(IndexId(3), narrow).is_ok());
    }

    #[test]
    fn test_table_and_index_together() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::open(dir.path().join("t.db"), StorageConfig::default()).unwrap();
        let schema = Arc::new(Schema::new(vec![
            Column::int("id", 0).with_unique(true),
            Column::char("name", 16, 1),
        ]));
        let key_schema = schema.project(&["id"]).unwrap();

        let mut table = engine.create_table(schema.clone()).unwrap();
        let mut index = engine.open_index(IndexId(1), key_schema.clone()).unwrap();
        for id in 0..30 {
            let mut row = Row::new(vec![Field::Int(id), Field::Char(format!("n{}", id))]);
            let rid = table.insert_tuple(&mut row).unwrap();
            let key = row.key_from_row(&schema, &key_schema).unwrap();
            assert!(index.insert_entry(&key, rid).unwrap());
        }

        let rid = index
            .scan_key(&Row::new(vec![Field::Int(17)]))
            .unwrap()
            .unwrap();
        let row = table.get_tuple(rid).unwrap().unwrap();
        assert_eq!(row.field(1), Some(&Field::Char("n17".into())));

        let first = table.first_page_id();
        drop(table);
        let reopened = engine.open_table(first, schema).unwrap();
        assert_eq!(reopened.iter().unwrap().count(), 30);
    }
}
