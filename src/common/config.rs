//! Configuration for ministore.
//!
//! Compile-time constants fix the on-disk geometry; [`StorageConfig`] carries
//! the knobs chosen when a database is opened.

use super::error::{Error, Result};
use super::page_id::PageId;

/// Size of a page in bytes (4KB).
///
/// Every on-disk structure (bitmap pages, tree nodes, table pages, the
/// index-roots page) is laid out within exactly this many bytes.
pub const PAGE_SIZE: usize = 4096;

/// Default number of frames in the buffer pool.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 1024;

/// Logical page holding the index-id to root-page-id table.
pub const INDEX_ROOTS_PAGE_ID: PageId = PageId(0);

/// Bytes of bookkeeping at the start of a bitmap page
/// (allocated count + next free hint).
pub const BITMAP_HEADER_SIZE: usize = 8;

/// Number of data pages tracked by one bitmap page.
pub const BITMAP_SIZE: usize = (PAGE_SIZE - BITMAP_HEADER_SIZE) * 8;

/// Bytes of bookkeeping at the start of the disk meta page
/// (checksum + allocated pages + extent count).
pub const DISK_META_HEADER_SIZE: usize = 12;

/// Number of extents (bitmap page + its data pages) the meta page can describe.
pub const MAX_EXTENTS: usize = (PAGE_SIZE - DISK_META_HEADER_SIZE) / 4;

/// Largest logical page id the disk manager can hand out.
pub const MAX_VALID_PAGE_ID: i32 = (MAX_EXTENTS * BITMAP_SIZE - 1) as i32;

/// Runtime configuration for a storage engine instance.
///
/// # Example
/// ```
/// use ministore::StorageConfig;
///
/// let config = StorageConfig::default()
///     .with_pool_size(64)
///     .with_leaf_max_size(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// Fan-out of B+tree leaves; derived from the key size when `None`.
    pub leaf_max_size: Option<usize>,
    /// Fan-out of B+tree internal nodes; derived from the key size when `None`.
    pub internal_max_size: Option<usize>,
}

impl StorageConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_leaf_max_size(mut self, max_size: usize) -> Self {
        self.leaf_max_size = Some(max_size);
        self
    }

    pub fn with_internal_max_size(mut self, max_size: usize) -> Self {
        self.internal_max_size = Some(max_size);
        self
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` for an empty pool, a leaf fan-out
    /// below 2 or an internal fan-out below 4.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if let Some(max) = self.leaf_max_size {
            if max < 2 {
                return Err(Error::InvalidConfig(format!(
                    "leaf_max_size must be >= 2, got {}",
                    max
                )));
            }
        }
        if let Some(max) = self.internal_max_size {
            if max < 4 {
                return Err(Error::InvalidConfig(format!(
                    "internal_max_size must be >= 4, got {}",
                    max
                )));
            }
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            leaf_max_size: None,
            internal_max_size: None,
        }
    }
}
