//! B+tree internal page.
//!
//! # Layout
//! ```text
//! Offset  Size                 Field
//! ------  ----                 -----
//! 0       28                   shared tree page header
//! 28      size * (K + 4)       (key, child page id) pairs
//! ```
//! The key of pair 0 is a placeholder: child 0 covers everything below
//! key 1. Splits leave the separator promoted to the parent in that slot
//! of the new right page.

use std::cmp::Ordering;

use crate::common::{PageId, Result};
use crate::index::KeyComparator;

use super::btree_page::{IndexPageType, TreePageHeader, TreePageHeaderMut, TREE_PAGE_HEADER_SIZE};

pub const INTERNAL_PAGE_HEADER_SIZE: usize = TREE_PAGE_HEADER_SIZE;

/// View over the bytes of an internal page.
pub struct InternalPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> TreePageHeader for InternalPage<B> {
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TreePageHeaderMut for InternalPage<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

impl<B: AsRef<[u8]>> InternalPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    /// Largest `max_size` an internal page with `key_size` keys can hold.
    pub fn capacity(key_size: usize) -> usize {
        (crate::common::config::PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / (key_size + PageId::SIZE)
    }

    #[inline]
    fn pair_size(&self) -> usize {
        self.key_size() + PageId::SIZE
    }

    #[inline]
    fn pair_offset(&self, index: usize) -> usize {
        INTERNAL_PAGE_HEADER_SIZE + index * self.pair_size()
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        let offset = self.pair_offset(index);
        &self.data.as_ref()[offset..offset + self.key_size()]
    }

    pub fn value_at(&self, index: usize) -> PageId {
        let offset = self.pair_offset(index) + self.key_size();
        PageId::from_le_slice(&self.data.as_ref()[offset..])
    }

    /// Position of `child` among this page's children.
    pub fn value_index(&self, child: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == child)
    }

    /// Child whose key range contains `key`: the rightmost child whose
    /// separator is `<= key`, or child 0 when `key` is below separator 1.
    pub fn lookup(&self, key: &[u8], cmp: &dyn KeyComparator) -> Result<PageId> {
        let (mut lo, mut hi) = (1, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(self.key_at(mid), key)? == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(self.value_at(lo - 1))
    }

    pub fn children(&self) -> Vec<PageId> {
        (0..self.size()).map(|i| self.value_at(i)).collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InternalPage<B> {
    /// Format an empty internal page.
    pub fn init(&mut self, page_id: PageId, parent_id: PageId, key_size: usize, max_size: usize) {
        self.set_page_type(IndexPageType::Internal);
        self.set_key_size(key_size);
        self.set_lsn(0);
        self.set_size(0);
        self.set_max_size(max_size);
        self.set_parent_page_id(parent_id);
        self.set_page_id(page_id);
    }

    pub fn set_key_at(&mut self, index: usize, key: &[u8]) {
        let offset = self.pair_offset(index);
        let key_size = self.key_size();
        self.data.as_mut()[offset..offset + key_size].copy_from_slice(&key[..key_size]);
    }

    pub fn set_value_at(&mut self, index: usize, child: PageId) {
        let offset = self.pair_offset(index) + self.key_size();
        child.write_le(&mut self.data.as_mut()[offset..]);
    }

    /// Fill a fresh root with two children split around `key`.
    pub fn populate_new_root(&mut self, old_child: PageId, key: &[u8], new_child: PageId) {
        self.set_value_at(0, old_child);
        self.set_key_at(1, key);
        self.set_value_at(1, new_child);
        self.set_size(2);
    }

    /// Insert `(key, new_child)` right after the pair pointing at `old_child`.
    ///
    /// Returns the size after insertion, or `None` if `old_child` is not a child.
    pub fn insert_node_after(
        &mut self,
        old_child: PageId,
        key: &[u8],
        new_child: PageId,
    ) -> Option<usize> {
        let index = self.value_index(old_child)? + 1;
        self.shift_right_from(index);
        self.set_key_at(index, key);
        self.set_value_at(index, new_child);
        Some(self.size())
    }

    /// Remove the pair at `index`.
    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        let start = self.pair_offset(index + 1);
        let end = self.pair_offset(size);
        let dest = self.pair_offset(index);
        self.data.as_mut().copy_within(start..end, dest);
        self.set_size(size - 1);
    }

    /// Split: move the upper half of the pairs to the empty `recipient`.
    ///
    /// Returns the moved children, which the caller must reparent. The
    /// first moved key lands in the recipient's placeholder slot and is
    /// the separator to push into the parent.
    pub fn move_half_to<R>(&mut self, recipient: &mut InternalPage<R>) -> Vec<PageId>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size / 2;
        recipient.append_from(self, keep, size - keep);
        self.set_size(keep);
        recipient.children()
    }

    /// Merge: append every pair to `recipient` (the left sibling), pulling
    /// the parent's separator `middle_key` down as the first moved key.
    ///
    /// Returns the moved children, which the caller must reparent.
    pub fn move_all_to<R>(&mut self, recipient: &mut InternalPage<R>, middle_key: &[u8]) -> Vec<PageId>
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.set_key_at(0, middle_key);
        let moved = self.children();
        let size = self.size();
        recipient.append_from(self, 0, size);
        self.set_size(0);
        moved
    }

    /// Redistribute: move this page's first child to the end of `recipient`
    /// (the left sibling) under the separator `middle_key`.
    ///
    /// Returns the moved child.
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut InternalPage<R>, middle_key: &[u8]) -> PageId
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let child = self.value_at(0);
        let size = recipient.size();
        recipient.set_key_at(size, middle_key);
        recipient.set_value_at(size, child);
        recipient.set_size(size + 1);
        self.remove(0);
        child
    }

    /// Redistribute: move this page's last child to the front of `recipient`
    /// (the right sibling). `middle_key` is the separator above `recipient`
    /// and becomes the key of its old first child.
    ///
    /// Returns the moved child.
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut InternalPage<R>, middle_key: &[u8]) -> PageId
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let child = self.value_at(last);
        let key = self.key_at(last).to_vec();
        recipient.set_key_at(0, middle_key);
        recipient.shift_right_from(0);
        recipient.set_key_at(0, &key);
        recipient.set_value_at(0, child);
        self.set_size(last);
        child
    }

    /// Open a gap at `index`, growing the page by one pair.
    fn shift_right_from(&mut self, index: usize) {
        let size = self.size();
        let start = self.pair_offset(index);
        let end = self.pair_offset(size);
        let pair = self.pair_size();
        self.data.as_mut().copy_within(start..end, start + pair);
        self.set_size(size + 1);
    }

    fn append_from<S: AsRef<[u8]>>(&mut self, src: &InternalPage<S>, from: usize, count: usize) {
        let size = self.size();
        let src_start = src.pair_offset(from);
        let src_end = src.pair_offset(from + count);
        let dest = self.pair_offset(size);
        let len = src_end - src_start;
        self.data.as_mut()[dest..dest + len]
            .copy_from_slice(&src.data.as_ref()[src_start..src_end]);
        self.set_size(size + count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BytewiseComparator;
    use crate::storage::page::Page;

    fn key(n: u32) -> [u8; 4] {
        n.to_be_bytes()
    }

    /// Children 100, 101, ... separated by keys 10, 20, ...
    fn filled_internal(page: &mut Page, page_id: i32, children: usize) {
        let mut node = InternalPage::new(page.as_mut_slice());
        node.init(PageId::new(page_id), PageId::INVALID, 4, 8);
        node.populate_new_root(PageId::new(100), &key(10), PageId::new(101));
        for i in 2..children {
            node.insert_node_after(
                PageId::new(99 + i as i32),
                &key(10 * i as u32),
                PageId::new(100 + i as i32),
            );
        }
    }

    #[test]
    fn test_internal_lookup() {
        let mut page = Page::new();
        filled_internal(&mut page, 1, 4);
        let node = InternalPage::new(page.as_slice());
        let cmp = BytewiseComparator;

        assert_eq!(node.size(), 4);
        assert_eq!(node.lookup(&key(0), &cmp).unwrap(), PageId::new(100));
        assert_eq!(node.lookup(&key(9), &cmp).unwrap(), PageId::new(100));
        assert_eq!(node.lookup(&key(10), &cmp).unwrap(), PageId::new(101));
        assert_eq!(node.lookup(&key(25), &cmp).unwrap(), PageId::new(102));
        assert_eq!(node.lookup(&key(30), &cmp).unwrap(), PageId::new(103));
        assert_eq!(node.lookup(&key(1000), &cmp).unwrap(), PageId::new(103));
    }

    #[test]
    fn test_internal_insert_after_and_remove() {
        let mut page = Page::new();
        filled_internal(&mut page, 1, 3);
        let mut node = InternalPage::new(page.as_mut_slice());

        assert_eq!(
            node.insert_node_after(PageId::new(100), &key(5), PageId::new(200)),
            Some(4)
        );
        assert_eq!(node.value_at(1), PageId::new(200));
        assert_eq!(node.key_at(1), &key(5));
        assert_eq!(node.value_index(PageId::new(102)), Some(3));
        assert_eq!(
            node.insert_node_after(PageId::new(999), &key(1), PageId::new(1)),
            None
        );

        node.remove(1);
        assert_eq!(node.children(), vec![PageId::new(100), PageId::new(101), PageId::new(102)]);
    }

    #[test]
    fn test_internal_split_promotes_first_moved_key() {
        let mut left_page = Page::new();
        let mut right_page = Page::new();
        filled_internal(&mut left_page, 1, 5);

        let mut left = InternalPage::new(left_page.as_mut_slice());
        let mut right = InternalPage::new(right_page.as_mut_slice());
        right.init(PageId::new(2), PageId::INVALID, 4, 8);

        let moved = left.move_half_to(&mut right);
        assert_eq!(left.size(), 2);
        assert_eq!(moved, vec![PageId::new(102), PageId::new(103), PageId::new(104)]);
        assert_eq!(right.key_at(0), &key(20));
    }

    #[test]
    fn test_internal_merge_pulls_separator_down() {
        let mut left_page = Page::new();
        let mut right_page = Page::new();
        filled_internal(&mut left_page, 1, 2);
        {
            let mut right = InternalPage::new(right_page.as_mut_slice());
            right.init(PageId::new(2), PageId::INVALID, 4, 8);
            right.populate_new_root(PageId::new(300), &key(70), PageId::new(301));
        }

        let mut left = InternalPage::new(left_page.as_mut_slice());
        let mut right = InternalPage::new(right_page.as_mut_slice());
        let moved = right.move_all_to(&mut left, &key(50));

        assert_eq!(moved, vec![PageId::new(300), PageId::new(301)]);
        assert_eq!(left.size(), 4);
        assert_eq!(left.key_at(2), &key(50));
        assert_eq!(left.key_at(3), &key(70));
        assert_eq!(left.value_at(3), PageId::new(301));
    }

    #[test]
    fn test_internal_redistribute() {
        let mut left_page = Page::new();
        let mut right_page = Page::new();
        filled_internal(&mut left_page, 1, 3);
        {
            let mut right = InternalPage::new(right_page.as_mut_slice());
            right.init(PageId::new(2), PageId::INVALID, 4, 8);
            right.populate_new_root(PageId::new(300), &key(70), PageId::new(301));
        }
        let mut left = InternalPage::new(left_page.as_mut_slice());
        let mut right = InternalPage::new(right_page.as_mut_slice());

        let child = left.move_last_to_front_of(&mut right, &key(50));
        assert_eq!(child, PageId::new(102));
        assert_eq!(left.size(), 2);
        assert_eq!(right.children(), vec![PageId::new(102), PageId::new(300), PageId::new(301)]);
        assert_eq!(right.key_at(1), &key(50));
        assert_eq!(right.key_at(2), &key(70));

        let child = right.move_first_to_end_of(&mut left, &key(20));
        assert_eq!(child, PageId::new(102));
        assert_eq!(left.children(), vec![PageId::new(100), PageId::new(101), PageId::new(102)]);
        assert_eq!(left.key_at(2), &key(20));
        assert_eq!(right.value_at(0), PageId::new(300));
    }
}
