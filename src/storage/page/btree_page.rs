//! Shared header of B+tree node pages.
//!
//! Internal and leaf pages start with the same 28-byte header:
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     page type (IndexPageType as u32)
//! 4       4     key size in bytes
//! 8       4     lsn (unused by recovery)
//! 12      4     current size (number of pairs)
//! 16      4     max size
//! 20      4     parent page id (-1 for the root)
//! 24      4     page id
//! ```
//! The type tag is decoded once per fetch by [`TreePage::from_bytes`], which
//! dispatches to the concrete [`InternalPage`] or [`LeafPage`] view.

use crate::common::{Error, PageId, Result};

use super::btree_internal_page::InternalPage;
use super::btree_leaf_page::LeafPage;

pub const OFFSET_PAGE_TYPE: usize = 0;
pub const OFFSET_KEY_SIZE: usize = 4;
pub const OFFSET_LSN: usize = 8;
pub const OFFSET_SIZE: usize = 12;
pub const OFFSET_MAX_SIZE: usize = 16;
pub const OFFSET_PARENT_PAGE_ID: usize = 20;
pub const OFFSET_PAGE_ID: usize = 24;

/// Size of the header shared by all tree pages.
pub const TREE_PAGE_HEADER_SIZE: usize = 28;

/// Type tag stored in the first word of a tree page.
#[repr(u32)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IndexPageType {
    /// Zeroed or foreign page.
    #[default]
    Invalid = 0,
    Leaf = 1,
    Internal = 2,
}

impl IndexPageType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => IndexPageType::Leaf,
            2 => IndexPageType::Internal,
            _ => IndexPageType::Invalid,
        }
    }
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Read access to the shared tree page header.
pub trait TreePageHeader {
    fn bytes(&self) -> &[u8];

    fn page_type(&self) -> IndexPageType {
        IndexPageType::from_u32(read_u32(self.bytes(), OFFSET_PAGE_TYPE))
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.page_type() == IndexPageType::Leaf
    }

    #[inline]
    fn key_size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_KEY_SIZE) as usize
    }

    #[inline]
    fn lsn(&self) -> u32 {
        read_u32(self.bytes(), OFFSET_LSN)
    }

    #[inline]
    fn size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_SIZE) as usize
    }

    #[inline]
    fn max_size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_MAX_SIZE) as usize
    }

    /// A non-root node with fewer pairs than this is underflowing.
    #[inline]
    fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    #[inline]
    fn parent_page_id(&self) -> PageId {
        PageId::from_le_slice(&self.bytes()[OFFSET_PARENT_PAGE_ID..])
    }

    #[inline]
    fn page_id(&self) -> PageId {
        PageId::from_le_slice(&self.bytes()[OFFSET_PAGE_ID..])
    }

    #[inline]
    fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }
}

/// Write access to the shared tree page header.
pub trait TreePageHeaderMut: TreePageHeader {
    fn bytes_mut(&mut self) -> &mut [u8];

    fn set_page_type(&mut self, page_type: IndexPageType) {
        write_u32(self.bytes_mut(), OFFSET_PAGE_TYPE, page_type as u32);
    }

    fn set_key_size(&mut self, key_size: usize) {
        write_u32(self.bytes_mut(), OFFSET_KEY_SIZE, key_size as u32);
    }

    fn set_lsn(&mut self, lsn: u32) {
        write_u32(self.bytes_mut(), OFFSET_LSN, lsn);
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.bytes_mut(), OFFSET_SIZE, size as u32);
    }

    fn set_max_size(&mut self, max_size: usize) {
        write_u32(self.bytes_mut(), OFFSET_MAX_SIZE, max_size as u32);
    }

    fn set_parent_page_id(&mut self, parent: PageId) {
        parent.write_le(&mut self.bytes_mut()[OFFSET_PARENT_PAGE_ID..]);
    }

    fn set_page_id(&mut self, page_id: PageId) {
        page_id.write_le(&mut self.bytes_mut()[OFFSET_PAGE_ID..]);
    }
}

/// Header-only view, used where the node kind does not matter
/// (reparenting children, reading a parent pointer).
pub struct TreePageView<B> {
    data: B,
}

impl<B: AsRef<[u8]>> TreePageView<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }
}

impl<B: AsRef<[u8]>> TreePageHeader for TreePageView<B> {
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreePageHeaderMut for TreePageView<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

/// A tree page decoded by its type tag.
pub enum TreePage<B> {
    Internal(InternalPage<B>),
    Leaf(LeafPage<B>),
}

impl<B: AsRef<[u8]>> TreePage<B> {
    /// Decode the type tag and wrap the bytes in the matching view.
    ///
    /// # Errors
    /// Returns `Error::Corruption` if the page is not a tree page.
    pub fn from_bytes(data: B) -> Result<Self> {
        let tag = read_u32(data.as_ref(), OFFSET_PAGE_TYPE);
        match IndexPageType::from_u32(tag) {
            IndexPageType::Leaf => Ok(TreePage::Leaf(LeafPage::new(data))),
            IndexPageType::Internal => Ok(TreePage::Internal(InternalPage::new(data))),
            IndexPageType::Invalid => {
                let page_id = PageId::from_le_slice(&data.as_ref()[OFFSET_PAGE_ID..]);
                Err(Error::Corruption(format!(
                    "{} has tree page type tag {}",
                    page_id, tag
                )))
            }
        }
    }

    pub fn header(&self) -> &dyn TreePageHeader {
        match self {
            TreePage::Internal(page) => page,
            TreePage::Leaf(page) => page,
        }
    }
}
