//! B+tree leaf page.
//!
//! # Layout
//! ```text
//! Offset  Size                 Field
//! ------  ----                 -----
//! 0       28                   shared tree page header
//! 28      4                    next leaf page id (-1 for the last leaf)
//! 32      size * (K + 8)       (key, row id) pairs sorted by key
//! ```
//! `K` is the page's key size.

use std::cmp::Ordering;

use crate::common::{PageId, Result, RowId};
use crate::index::KeyComparator;

use super::btree_page::{IndexPageType, TreePageHeader, TreePageHeaderMut, TREE_PAGE_HEADER_SIZE};

const OFFSET_NEXT_PAGE_ID: usize = TREE_PAGE_HEADER_SIZE;

/// Size of the leaf header including the next-leaf pointer.
pub const LEAF_PAGE_HEADER_SIZE: usize = TREE_PAGE_HEADER_SIZE + 4;

/// View over the bytes of a leaf page.
pub struct LeafPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> TreePageHeader for LeafPage<B> {
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreePageHeaderMut for LeafPage<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

impl<B: AsRef<[u8]>> LeafPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    /// Largest `max_size` a leaf with `key_size` keys can hold.
    pub fn capacity(key_size: usize) -> usize {
        (crate::common::config::PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / (key_size + RowId::SIZE)
    }

    #[inline]
    fn pair_size(&self) -> usize {
        self.key_size() + RowId::SIZE
    }

    #[inline]
    fn pair_offset(&self, index: usize) -> usize {
        LEAF_PAGE_HEADER_SIZE + index * self.pair_size()
    }

    #[inline]
    pub fn next_page_id(&self) -> PageId {
        PageId::from_le_slice(&self.data.as_ref()[OFFSET_NEXT_PAGE_ID..])
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        let offset = self.pair_offset(index);
        &self.data.as_ref()[offset..offset + self.key_size()]
    }

    pub fn value_at(&self, index: usize) -> RowId {
        let offset = self.pair_offset(index) + self.key_size();
        RowId::from_le_slice(&self.data.as_ref()[offset..])
    }

    /// First index whose key is not less than `key` (may equal `size()`).
    pub fn key_index(&self, key: &[u8], cmp: &dyn KeyComparator) -> Result<usize> {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(self.key_at(mid), key)? == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Exact-match lookup.
    pub fn lookup(&self, key: &[u8], cmp: &dyn KeyComparator) -> Result<Option<RowId>> {
        let index = self.key_index(key, cmp)?;
        if index < self.size() && cmp.compare(self.key_at(index), key)? == Ordering::Equal {
            Ok(Some(self.value_at(index)))
        } else {
            Ok(None)
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafPage<B> {
    /// Format an empty leaf.
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, key_size: usize, max_size: usize) {
        self.set_page_type(IndexPageType::Leaf);
        self.set_key_size(key_size);
        self.set_lsn(0);
        self.set_size(0);
        self.set_max_size(max_size);
        self.set_parent_page_id(parent_id);
        self.set_page_id(page_id);
        self.set_next_page_id(PageId::INVALID);
    }

    pub fn set_next_page_id(&mut self, next: PageId) {
        next.write_le(&mut self.data.as_mut()[OFFSET_NEXT_PAGE_ID..]);
    }

    fn write_pair(&mut self, index: usize, key: &[u8], value: RowId) {
        let offset = self.pair_offset(index);
        let key_size = self.key_size();
        let data = self.data.as_mut();
        data[offset..offset + key_size].copy_from_slice(&key[..key_size]);
        value.write_le(&mut data[offset + key_size..offset + key_size + RowId::SIZE]);
    }

    /// Insert a pair at its sorted position. The key must not be present.
    ///
    /// Returns the size after insertion.
    pub fn insert(&mut self, key: &[u8], value: RowId, cmp: &dyn KeyComparator) -> Result<usize> {
        let index = self.key_index(key, cmp)?;
        let size = self.size();
        let start = self.pair_offset(index);
        let end = self.pair_offset(size);
        let pair = self.pair_size();
        self.data.as_mut().copy_within(start..end, start + pair);
        self.write_pair(index, key, value);
        self.set_size(size + 1);
        Ok(size + 1)
    }

    /// Remove `key` if present. Returns the index it occupied.
    pub fn remove(&mut self, key: &[u8], cmp: &dyn KeyComparator) -> Result<Option<usize>> {
        let index = self.key_index(key, cmp)?;
        let size = self.size();
        if index >= size || cmp.compare(self.key_at(index), key)? != Ordering::Equal {
            return Ok(None);
        }
        self.remove_at(index);
        Ok(Some(index))
    }

    fn remove_at(&mut self, index: usize) {
        let size = self.size();
        let start = self.pair_offset(index + 1);
        let end = self.pair_offset(size);
        let dest = self.pair_offset(index);
        self.data.as_mut().copy_within(start..end, dest);
        self.set_size(size - 1);
    }

    /// Append `count` pairs copied out of `src` starting at `from`.
    fn append_from<S: AsRef<[u8]>>(&mut self, src: &LeafPage<S>, from: usize, count: usize) {
        let size = self.size();
        let src_start = src.pair_offset(from);
        let src_end = src.pair_offset(from + count);
        let dest = self.pair_offset(size);
        let len = src_end - src_start;
        self.data.as_mut()[dest..dest + len]
            .copy_from_slice(&src.data.as_ref()[src_start..src_end]);
        self.set_size(size + count);
    }

    /// Split: move the upper half of the pairs to the empty `recipient`.
    ///
    /// This page keeps `size / 2` pairs.
    pub fn move_half_to<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size / 2;
        recipient.append_from(self, keep, size - keep);
        self.set_size(keep);
    }

    /// Merge: append every pair to `recipient` (the left sibling) and hand
    /// over the next-leaf link.
    pub fn move_all_to<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        recipient.append_from(self, 0, size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Redistribute: move this page's first pair to the end of `recipient`
    /// (the left sibling).
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        recipient.append_from(self, 0, 1);
        self.remove_at(0);
    }

    /// Redistribute: move this page's last pair to the front of `recipient`
    /// (the right sibling).
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut LeafPage<R>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let value = self.value_at(last);
        let key = self.key_at(last).to_vec();
        recipient.insert_front(&key, value);
        self.set_size(last);
    }

    fn insert_front(&mut self, key: &[u8], value: RowId) {
        let size = self.size();
        let start = self.pair_offset(0);
        let end = self.pair_offset(size);
        let pair = self.pair_size();
        self.data.as_mut().copy_within(start..end, start + pair);
        self.write_pair(0, key, value);
        self.set_size(size + 1);
    }
}
