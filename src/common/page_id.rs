//! Page identifier type.

use std::fmt;

use super::config::MAX_VALID_PAGE_ID;

/// Identifies a logical page on disk.
///
/// Stored on disk as a little-endian `i32`; `-1` is the sentinel for
/// "no page" (an empty tree root, the parent of a root node, the end of
/// the leaf chain).
///
/// # Example
/// ```
/// use ministore::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub i32);

impl PageId {
    /// Invalid/sentinel page ID.
    pub const INVALID: PageId = PageId(-1);

    /// Size of a serialized page ID in bytes.
    pub const SIZE: usize = 4;

    /// Create a new PageId.
    #[inline]
    pub fn new(id: i32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is not the sentinel value.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Check that the ID is neither the sentinel nor beyond the addressable range.
    #[inline]
    pub fn is_in_range(&self) -> bool {
        self.0 >= 0 && self.0 <= MAX_VALID_PAGE_ID
    }

    /// Decode from the first four bytes of `buf`.
    #[inline]
    pub fn from_le_slice(buf: &[u8]) -> Self {
        PageId(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
    }

    /// Encode into the first four bytes of `buf`.
    #[inline]
    pub fn write_le(&self, buf: &mut [u8]) {
        buf[..Self::SIZE].copy_from_slice(&self.0.to_le_bytes());
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Page({})", self.0)
        } else {
            write!(f, "Page(INVALID)")
        }
    }
}
