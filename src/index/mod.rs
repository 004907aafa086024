//! Index structures.
//!
//! # Components
//! - [`KeyComparator`] - Ordering over fixed-size key blobs
//! - [`KeyManager`] - Encodes key rows and compares them field by field
//! - [`btree`] - Disk-resident B+tree built on the buffer pool

pub mod btree;
mod key;

pub use btree::{BPlusTree, BPlusTreeIndex, IndexIterator};
pub use key::{BytewiseComparator, KeyComparator, KeyManager};

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::common::config::INDEX_ROOTS_PAGE_ID;
use crate::common::{Error, Result};
use crate::storage::page::IndexRootsPage;

/// Make sure the index-roots page exists, allocating it on a fresh file.
///
/// # Errors
/// Returns `Error::Corruption` if page 0 is free but the allocator hands
/// out a different page, or if an existing roots page is damaged.
pub fn ensure_index_roots_page(bpm: &BufferPoolManager) -> Result<()> {
    if !bpm.is_page_free(INDEX_ROOTS_PAGE_ID) {
        let guard = bpm.fetch_page_read(INDEX_ROOTS_PAGE_ID)?;
        IndexRootsPage::open(guard.as_slice())?;
        return Ok(());
    }
    let mut guard = bpm.new_page()?;
    if guard.page_id() != INDEX_ROOTS_PAGE_ID {
        return Err(Error::Corruption(format!(
            "index roots page allocated as {}",
            guard.page_id()
        )));
    }
    // A zeroed page is an empty roots table; make sure it reaches disk.
    guard.mark_dirty();
    debug!("created index roots page");
    Ok(())
}
