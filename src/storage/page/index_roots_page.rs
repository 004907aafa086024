//! Index roots page - the persistent index id to root page id table.
//!
//! Lives at [`INDEX_ROOTS_PAGE_ID`](crate::common::config::INDEX_ROOTS_PAGE_ID).
//!
//! # Layout
//! ```text
//! Offset  Size       Field
//! ------  ----       -----
//! 0       4          entry count
//! 4       8 * count  (index id: u32, root page id: i32) pairs
//! ```

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, IndexId, PageId, Result};

const OFFSET_COUNT: usize = 0;
const ENTRIES_OFFSET: usize = 4;
const ENTRY_SIZE: usize = 8;

/// Maximum number of indexes one roots page can track.
pub const MAX_INDEX_ROOTS: usize = (PAGE_SIZE - ENTRIES_OFFSET) / ENTRY_SIZE;

pub struct IndexRootsPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> IndexRootsPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    /// View over a roots page read from disk.
    ///
    /// # Errors
    /// Returns `Error::Corruption` if the entry count exceeds
    /// [`MAX_INDEX_ROOTS`].
    pub fn open(data: B) -> Result<Self> {
        let page = Self { data };
        let count = page.stored_count();
        if count > MAX_INDEX_ROOTS {
            return Err(Error::Corruption(format!(
                "index roots page holds {} entries, at most {} fit",
                count, MAX_INDEX_ROOTS
            )));
        }
        Ok(page)
    }

    fn stored_count(&self) -> usize {
        let d = self.data.as_ref();
        u32::from_le_bytes([d[0], d[1], d[2], d[3]]) as usize
    }

    /// Number of registered indexes, never more than [`MAX_INDEX_ROOTS`].
    pub fn count(&self) -> usize {
        self.stored_count().min(MAX_INDEX_ROOTS)
    }

    fn index_id_at(&self, slot: usize) -> IndexId {
        let d = self.data.as_ref();
        let o = ENTRIES_OFFSET + slot * ENTRY_SIZE;
        IndexId(u32::from_le_bytes([d[o], d[o + 1], d[o + 2], d[o + 3]]))
    }

    fn root_at(&self, slot: usize) -> PageId {
        PageId::from_le_slice(&self.data.as_ref()[ENTRIES_OFFSET + slot * ENTRY_SIZE + 4..])
    }

    fn find(&self, index_id: IndexId) -> Option<usize> {
        (0..self.count()).find(|&slot| self.index_id_at(slot) == index_id)
    }

    /// Root page recorded for `index_id`, if the index is registered.
    pub fn get_root_id(&self, index_id: IndexId) -> Option<PageId> {
        self.find(index_id).map(|slot| self.root_at(slot))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IndexRootsPage<B> {
    /// Register a new index. Returns `false` if it already exists or the
    /// page is full.
    pub fn insert(&mut self, index_id: IndexId, root: PageId) -> bool {
        let count = self.count();
        if self.find(index_id).is_some() || count >= MAX_INDEX_ROOTS {
            return false;
        }
        self.write_entry(count, index_id, root);
        self.set_count(count + 1);
        true
    }

    /// Change the root of a registered index. Returns `false` if unknown.
    pub fn update(&mut self, index_id: IndexId, root: PageId) -> bool {
        match self.find(index_id) {
            Some(slot) => {
                self.write_entry(slot, index_id, root);
                true
            }
            None => false,
        }
    }

    /// Forget an index. Returns `false` if unknown.
    pub fn delete(&mut self, index_id: IndexId) -> bool {
        let Some(slot) = self.find(index_id) else {
            return false;
        };
        let count = self.count();
        let start = ENTRIES_OFFSET + (slot + 1) * ENTRY_SIZE;
        let end = ENTRIES_OFFSET + count * ENTRY_SIZE;
        self.data
            .as_mut()
            .copy_within(start..end, ENTRIES_OFFSET + slot * ENTRY_SIZE);
        self.set_count(count - 1);
        true
    }

    fn set_count(&mut self, count: usize) {
        self.data.as_mut()[OFFSET_COUNT..OFFSET_COUNT + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn write_entry(&mut self, slot: usize, index_id: IndexId, root: PageId) {
        let o = ENTRIES_OFFSET + slot * ENTRY_SIZE;
        let d = self.data.as_mut();
        d[o..o + 4].copy_from_slice(&index_id.0.to_le_bytes());
        root.write_le(&mut d[o + 4..o + 8]);
    }
}
