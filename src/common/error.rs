//! Error types for ministore.

use thiserror::Error;

use super::page_id::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the storage core.
///
/// Conditions the callers treat as ordinary outcomes (a duplicate key, a
/// lookup miss, unpinning a page that is not cached) are not errors and
/// are reported through `bool`/`Option` returns instead.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page ID is the sentinel or lies outside the addressable range.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    /// The page is not allocated on disk.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Every frame is pinned and nothing can be evicted.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Attempted to delete a page that is still pinned.
    #[error("{0} is in use (pin count {1})")]
    PageInUse(PageId, u32),

    /// Attempted to flush a page that is not resident in the buffer pool.
    #[error("{0} is not cached")]
    PageNotCached(PageId),

    /// On-disk data failed a magic number, checksum or type tag check.
    #[error("Corruption: {0}")]
    Corruption(String),

    /// The disk bitmap has no free page left.
    #[error("Disk is out of free pages")]
    OutOfSpace,

    /// Page allocation failed in the middle of a structural tree change.
    ///
    /// Pages mutated before the failure point are left as they were; the
    /// tree must be considered unusable afterwards.
    #[error("Out of memory while {0}")]
    OutOfMemory(&'static str),

    /// The index-roots page has no slot left for another index.
    #[error("Index roots page is full")]
    IndexRootsFull,

    /// A serialized row does not fit in an empty table page.
    #[error("Tuple of {0} bytes does not fit in a page")]
    TupleTooLarge(usize),

    /// A serialized key is larger than the index key size.
    #[error("Key of {size} bytes exceeds index key size {max}")]
    KeyTooLarge { size: usize, max: usize },

    /// A row's fields do not line up with the schema it is serialized with.
    #[error("Row has {actual} fields but schema has {expected} columns")]
    SchemaMismatch { expected: usize, actual: usize },

    /// A key schema names a column the table schema does not have.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "No free frames available in buffer pool");

        let err = Error::PageInUse(PageId::new(3), 2);
        assert_eq!(format!("{}", err), "Page(3) is in use (pin count 2)");

        let err = Error::KeyTooLarge { size: 40, max: 32 };
        assert_eq!(format!("{}", err), "Key of 40 bytes exceeds index key size 32");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
