//! B+tree over fixed-size keys, stored in buffer pool pages.
//!
//! Every node is a page fetched through the [`BufferPoolManager`]; guards
//! are dropped before moving to another level, so an operation holds at
//! most two or three pins at a time regardless of tree height.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, error};

use crate::buffer::{BufferPoolManager, PageWriteGuard};
use crate::common::config::INDEX_ROOTS_PAGE_ID;
use crate::common::{Error, IndexId, PageId, Result, RowId};
use crate::index::KeyComparator;
use crate::storage::page::{
    IndexRootsPage, InternalPage, LeafPage, TreePage, TreePageHeader, TreePageHeaderMut,
    TreePageView,
};

use super::IndexIterator;

/// Header fields needed to decide on splits and merges.
#[derive(Debug, Clone, Copy)]
struct NodeInfo {
    size: usize,
    min_size: usize,
    parent: PageId,
}

/// A unique-key B+tree.
///
/// # Structure
/// ```text
///                 ┌──────────────────────┐
///                 │ Internal  [_ | 20]   │   key 0 is a placeholder
///                 └───┬──────────────┬───┘
///          ┌──────────┘              └──────────┐
///   ┌──────▼───────┐   next    ┌────────────────▼┐
///   │ Leaf [5 | 9] │──────────▶│ Leaf [20 | 31]  │──▶ INVALID
///   └──────────────┘           └─────────────────┘
/// ```
/// The root page id is recorded in the index-roots page under the tree's
/// [`IndexId`] whenever it changes.
///
/// Mutations take `&mut self`; lookups and iterators borrow the tree
/// shared, so a tree cannot change under a live iterator.
pub struct BPlusTree {
    index_id: IndexId,
    bpm: Arc<BufferPoolManager>,
    comparator: Arc<dyn KeyComparator>,
    key_size: usize,
    leaf_max_size: usize,
    internal_max_size: usize,
    root_page_id: PageId,
}

impl BPlusTree {
    /// Open the tree registered as `index_id`, or an empty one if the
    /// index-roots page has no entry for it.
    ///
    /// Fan-outs default to what fits in a page for `key_size`.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a zero key size, or a fan-out below the
    ///   minimum (2 for leaves, 4 for internal pages) or above page capacity
    /// - `Error::InvalidConfig` if an existing tree was built with a
    ///   different key size
    /// - `Error::PageNotFound` if the index-roots page was never created
    pub fn new(
        index_id: IndexId,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        key_size: usize,
        leaf_max_size: Option<usize>,
        internal_max_size: Option<usize>,
    ) -> Result<Self> {
        if key_size == 0 {
            return Err(Error::InvalidConfig("key_size must be > 0".into()));
        }
        let leaf_max_size = Self::check_fan_out(
            "leaf_max_size",
            leaf_max_size,
            2,
            LeafPage::<&[u8]>::capacity(key_size),
        )?;
        let internal_max_size = Self::check_fan_out(
            "internal_max_size",
            internal_max_size,
            4,
            InternalPage::<&[u8]>::capacity(key_size),
        )?;

        let root_page_id = {
            let guard = bpm.fetch_page_read(INDEX_ROOTS_PAGE_ID)?;
            IndexRootsPage::open(guard.as_slice())?
                .get_root_id(index_id)
                .unwrap_or(PageId::INVALID)
        };
        if root_page_id.is_valid() {
            let guard = bpm.fetch_page_read(root_page_id)?;
            let stored = TreePage::from_bytes(guard.as_slice())?.header().key_size();
            if stored != key_size {
                return Err(Error::InvalidConfig(format!(
                    "{} was built with key_size {}, opened with {}",
                    index_id, stored, key_size
                )));
            }
        }

        Ok(Self {
            index_id,
            bpm,
            comparator,
            key_size,
            leaf_max_size,
            internal_max_size,
            root_page_id,
        })
    }

    fn check_fan_out(
        name: &str,
        requested: Option<usize>,
        min: usize,
        capacity: usize,
    ) -> Result<usize> {
        let size = requested.unwrap_or(capacity);
        if size < min || size > capacity {
            return Err(Error::InvalidConfig(format!(
                "{} must be in {}..={}, got {}",
                name, min, capacity, size
            )));
        }
        Ok(size)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    #[inline]
    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.root_page_id.is_valid()
    }

    #[inline]
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    #[inline]
    pub fn leaf_max_size(&self) -> usize {
        self.leaf_max_size
    }

    #[inline]
    pub fn internal_max_size(&self) -> usize {
        self.internal_max_size
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Point lookup.
    ///
    /// # Errors
    /// Returns `Error::KeyTooLarge` for a key longer than the key size, or
    /// any buffer pool error met on the way down.
    pub fn get_value(&self, key: &[u8]) -> Result<Option<RowId>> {
        let key = self.fixed_key(key)?;
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_id = self.find_leaf(Some(&key[..]))?;
        let guard = self.bpm.fetch_page_read(leaf_id)?;
        LeafPage::new(guard.as_slice()).lookup(&key, self.comparator.as_ref())
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator<'_>> {
        if self.is_empty() {
            return Ok(self.end());
        }
        let leaf_id = self.find_leaf(None)?;
        IndexIterator::new(&self.bpm, leaf_id, 0)
    }

    /// Iterator positioned at the first key not less than `key`.
    pub fn begin_at(&self, key: &[u8]) -> Result<IndexIterator<'_>> {
        let key = self.fixed_key(key)?;
        if self.is_empty() {
            return Ok(self.end());
        }
        let leaf_id = self.find_leaf(Some(&key[..]))?;
        let index = {
            let guard = self.bpm.fetch_page_read(leaf_id)?;
            LeafPage::new(guard.as_slice()).key_index(&key, self.comparator.as_ref())?
        };
        IndexIterator::new(&self.bpm, leaf_id, index)
    }

    /// The past-the-end iterator; holds no page.
    pub fn end(&self) -> IndexIterator<'_> {
        IndexIterator::end(&self.bpm)
    }

    /// Descend to the leaf that covers `key`, or to the leftmost leaf.
    fn find_leaf(&self, key: Option<&[u8]>) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            match TreePage::from_bytes(guard.as_slice())? {
                TreePage::Leaf(_) => return Ok(page_id),
                TreePage::Internal(node) => {
                    page_id = match key {
                        Some(key) => node.lookup(key, self.comparator.as_ref())?,
                        None => node.value_at(0),
                    };
                }
            }
        }
    }

    /// Smallest key stored under `page_id`.
    fn leftmost_key(&self, page_id: PageId) -> Result<Vec<u8>> {
        let mut page_id = page_id;
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            match TreePage::from_bytes(guard.as_slice())? {
                TreePage::Leaf(leaf) if leaf.size() > 0 => return Ok(leaf.key_at(0).to_vec()),
                TreePage::Leaf(_) => {
                    return Err(Error::Corruption(format!("empty non-root leaf {}", page_id)))
                }
                TreePage::Internal(node) => page_id = node.value_at(0),
            }
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert a unique key.
    ///
    /// Returns `Ok(false)` without modifying the tree if the key exists.
    ///
    /// # Errors
    /// - `Error::KeyTooLarge` for a key longer than the key size
    /// - `Error::OutOfMemory` if no page could be allocated for a new root
    ///   or a split; the tree may be left partially modified
    pub fn insert(&mut self, key: &[u8], value: RowId) -> Result<bool> {
        let key = self.fixed_key(key)?.into_owned();
        if self.is_empty() {
            self.start_new_tree(&key, value)?;
            return Ok(true);
        }

        let leaf_id = self.find_leaf(Some(&key[..]))?;
        let mut guard = self.bpm.fetch_page_write(leaf_id)?;
        let cmp = self.comparator.as_ref();
        if LeafPage::new(guard.as_slice()).lookup(&key, cmp)?.is_some() {
            return Ok(false);
        }

        let mut leaf = LeafPage::new(guard.as_mut_slice());
        if leaf.insert(&key, value, cmp)? < leaf.max_size() {
            return Ok(true);
        }

        let mut sibling_guard = self.new_tree_page("splitting a leaf")?;
        let sibling_id = sibling_guard.page_id();
        let parent_id = leaf.parent_page_id();
        let mut sibling = LeafPage::new(sibling_guard.as_mut_slice());
        sibling.init(sibling_id, parent_id, self.key_size, leaf.max_size());
        leaf.move_half_to(&mut sibling);
        sibling.set_next_page_id(leaf.next_page_id());
        leaf.set_next_page_id(sibling_id);
        let separator = sibling.key_at(0).to_vec();
        drop(sibling_guard);
        drop(guard);

        debug!("{}: split leaf {} into {}", self.index_id, leaf_id, sibling_id);
        self.insert_into_parent(leaf_id, parent_id, &separator, sibling_id)?;
        Ok(true)
    }

    fn start_new_tree(&mut self, key: &[u8], value: RowId) -> Result<()> {
        let mut guard = self.new_tree_page("starting a new tree")?;
        let root_id = guard.page_id();
        let mut leaf = LeafPage::new(guard.as_mut_slice());
        leaf.init(root_id, PageId::INVALID, self.key_size, self.leaf_max_size);
        leaf.insert(key, value, self.comparator.as_ref())?;
        drop(guard);

        self.set_root(root_id)
    }

    /// Hook `new_id` into the parent of `old_id` after a split of `old_id`.
    fn insert_into_parent(
        &mut self,
        old_id: PageId,
        parent_id: PageId,
        separator: &[u8],
        new_id: PageId,
    ) -> Result<()> {
        if !parent_id.is_valid() {
            let mut guard = self.new_tree_page("growing a new root")?;
            let root_id = guard.page_id();
            let mut root = InternalPage::new(guard.as_mut_slice());
            root.init(root_id, PageId::INVALID, self.key_size, self.internal_max_size);
            root.populate_new_root(old_id, separator, new_id);
            drop(guard);

            self.set_parent(old_id, root_id)?;
            self.set_parent(new_id, root_id)?;
            debug!("{}: new root {}", self.index_id, root_id);
            return self.set_root(root_id);
        }

        let mut guard = self.bpm.fetch_page_write(parent_id)?;
        let mut parent = InternalPage::new(guard.as_mut_slice());
        let size = parent
            .insert_node_after(old_id, separator, new_id)
            .ok_or_else(|| {
                Error::Corruption(format!("{} is not a child of {}", old_id, parent_id))
            })?;
        if size < parent.max_size() {
            return Ok(());
        }

        let mut sibling_guard = self.new_tree_page("splitting an internal page")?;
        let sibling_id = sibling_guard.page_id();
        let grandparent_id = parent.parent_page_id();
        let mut sibling = InternalPage::new(sibling_guard.as_mut_slice());
        sibling.init(sibling_id, grandparent_id, self.key_size, parent.max_size());
        let moved = parent.move_half_to(&mut sibling);
        let promoted = sibling.key_at(0).to_vec();
        drop(sibling_guard);
        drop(guard);

        for child in moved {
            self.set_parent(child, sibling_id)?;
        }
        debug!("{}: split internal {} into {}", self.index_id, parent_id, sibling_id);
        self.insert_into_parent(parent_id, grandparent_id, &promoted, sibling_id)
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Remove a key. Returns `Ok(false)` if it was not present.
    ///
    /// # Errors
    /// Returns `Error::KeyTooLarge` for a key longer than the key size, or
    /// any buffer pool error met while rebalancing.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool> {
        let key = self.fixed_key(key)?.into_owned();
        if self.is_empty() {
            return Ok(false);
        }

        let leaf_id = self.find_leaf(Some(&key[..]))?;
        let (info, removed_first) = {
            let mut guard = self.bpm.fetch_page_write(leaf_id)?;
            let cmp = self.comparator.as_ref();
            if LeafPage::new(guard.as_slice()).lookup(&key, cmp)?.is_none() {
                return Ok(false);
            }
            let mut leaf = LeafPage::new(guard.as_mut_slice());
            let index = leaf.remove(&key, cmp)?;
            let info = NodeInfo {
                size: leaf.size(),
                min_size: leaf.min_size(),
                parent: leaf.parent_page_id(),
            };
            (info, index == Some(0))
        };

        if info.size < info.min_size && self.coalesce_or_redistribute(leaf_id)? {
            // Folded into its left sibling, whose smallest key is unchanged.
            return Ok(true);
        }
        if removed_first {
            self.refresh_left_separator(leaf_id)?;
        }
        Ok(true)
    }

    /// Point the separator bounding `leaf_id` from the left at its current
    /// first key.
    fn refresh_left_separator(&self, leaf_id: PageId) -> Result<()> {
        let (parent, first) = {
            let guard = self.bpm.fetch_page_read(leaf_id)?;
            let leaf = LeafPage::new(guard.as_slice());
            if leaf.size() == 0 {
                return Ok(());
            }
            (leaf.parent_page_id(), leaf.key_at(0).to_vec())
        };
        self.propagate_first_key(leaf_id, parent, &first)
    }

    /// Rewrite the separator that bounds the subtree of `node_id` from the
    /// left, walking up while the node is its parent's first child.
    fn propagate_first_key(&self, node_id: PageId, parent_id: PageId, key: &[u8]) -> Result<()> {
        let (mut child, mut parent_id) = (node_id, parent_id);
        while parent_id.is_valid() {
            let mut guard = self.bpm.fetch_page_write(parent_id)?;
            let (index, grandparent) = {
                let parent = InternalPage::new(guard.as_slice());
                let index = parent.value_index(child).ok_or_else(|| {
                    Error::Corruption(format!("{} is not a child of {}", child, parent_id))
                })?;
                (index, parent.parent_page_id())
            };
            if index > 0 {
                InternalPage::new(guard.as_mut_slice()).set_key_at(index, key);
                return Ok(());
            }
            child = parent_id;
            parent_id = grandparent;
        }
        Ok(())
    }

    /// Fix an underflowing node by borrowing from a sibling or merging.
    ///
    /// Returns whether `node_id` itself was deleted.
    fn coalesce_or_redistribute(&mut self, node_id: PageId) -> Result<bool> {
        let node = self.node_info(node_id)?;
        if !node.parent.is_valid() {
            return self.adjust_root(node_id);
        }
        let parent_id = node.parent;

        let (index, left, right) = {
            let guard = self.bpm.fetch_page_read(parent_id)?;
            let parent = InternalPage::new(guard.as_slice());
            let index = parent.value_index(node_id).ok_or_else(|| {
                Error::Corruption(format!("{} is not a child of {}", node_id, parent_id))
            })?;
            let left = (index > 0).then(|| parent.value_at(index - 1));
            let right = (index + 1 < parent.size()).then(|| parent.value_at(index + 1));
            (index, left, right)
        };

        if let Some(left_id) = left {
            if self.node_info(left_id)?.size > node.min_size {
                self.redistribute(left_id, node_id, parent_id, index, true)?;
                return Ok(false);
            }
        }
        if let Some(right_id) = right {
            if self.node_info(right_id)?.size > node.min_size {
                self.redistribute(node_id, right_id, parent_id, index + 1, false)?;
                return Ok(false);
            }
        }

        let (left_id, right_id, separator_index) = match (left, right) {
            (Some(left_id), _) => (left_id, node_id, index),
            (None, Some(right_id)) => (node_id, right_id, index + 1),
            (None, None) => {
                return Err(Error::Corruption(format!(
                    "non-root {} has no siblings",
                    node_id
                )))
            }
        };
        if self.merge(left_id, right_id, parent_id, separator_index)? {
            self.coalesce_or_redistribute(parent_id)?;
        }
        Ok(right_id == node_id)
    }

    /// Move one entry across the separator at `separator_index` in the
    /// parent and re-derive that separator.
    fn redistribute(
        &self,
        left_id: PageId,
        right_id: PageId,
        parent_id: PageId,
        separator_index: usize,
        left_to_right: bool,
    ) -> Result<()> {
        let middle = self.separator_at(parent_id, separator_index)?;
        let moved_child = {
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            match (
                TreePage::from_bytes(left_guard.as_mut_slice())?,
                TreePage::from_bytes(right_guard.as_mut_slice())?,
            ) {
                (TreePage::Leaf(mut left), TreePage::Leaf(mut right)) => {
                    if left_to_right {
                        left.move_last_to_front_of(&mut right);
                    } else {
                        right.move_first_to_end_of(&mut left);
                    }
                    None
                }
                (TreePage::Internal(mut left), TreePage::Internal(mut right)) => {
                    Some(if left_to_right {
                        (left.move_last_to_front_of(&mut right, &middle), right_id)
                    } else {
                        (right.move_first_to_end_of(&mut left, &middle), left_id)
                    })
                }
                _ => return Err(Self::mixed_siblings(left_id, right_id)),
            }
        };

        if let Some((child, new_parent)) = moved_child {
            self.set_parent(child, new_parent)?;
        }
        let separator = self.leftmost_key(right_id)?;
        self.set_separator_at(parent_id, separator_index, &separator)?;
        debug!(
            "{}: redistributed between {} and {}",
            self.index_id, left_id, right_id
        );
        Ok(())
    }

    /// Fold `right_id` into `left_id`, drop their separator from the parent
    /// and delete the right page.
    ///
    /// Returns whether the parent now underflows.
    fn merge(
        &self,
        left_id: PageId,
        right_id: PageId,
        parent_id: PageId,
        separator_index: usize,
    ) -> Result<bool> {
        let middle = self.separator_at(parent_id, separator_index)?;
        let moved = {
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            match (
                TreePage::from_bytes(left_guard.as_mut_slice())?,
                TreePage::from_bytes(right_guard.as_mut_slice())?,
            ) {
                (TreePage::Leaf(mut left), TreePage::Leaf(mut right)) => {
                    right.move_all_to(&mut left);
                    Vec::new()
                }
                (TreePage::Internal(mut left), TreePage::Internal(mut right)) => {
                    right.move_all_to(&mut left, &middle)
                }
                _ => return Err(Self::mixed_siblings(left_id, right_id)),
            }
        };
        for child in moved {
            self.set_parent(child, left_id)?;
        }

        let parent_underflows = {
            let mut guard = self.bpm.fetch_page_write(parent_id)?;
            let mut parent = InternalPage::new(guard.as_mut_slice());
            parent.remove(separator_index);
            parent.size() < parent.min_size()
        };
        self.bpm.delete_page(right_id)?;
        debug!("{}: merged {} into {}", self.index_id, right_id, left_id);
        Ok(parent_underflows)
    }

    /// Shrink the tree at the root. Returns whether the old root was deleted.
    ///
    /// An empty root leaf empties the tree; an internal root with a single
    /// child hands the root over to that child.
    fn adjust_root(&mut self, root_id: PageId) -> Result<bool> {
        let new_root = {
            let guard = self.bpm.fetch_page_read(root_id)?;
            match TreePage::from_bytes(guard.as_slice())? {
                TreePage::Leaf(leaf) if leaf.size() == 0 => Some(PageId::INVALID),
                TreePage::Internal(node) if node.size() == 1 => Some(node.value_at(0)),
                _ => None,
            }
        };
        let Some(new_root) = new_root else {
            return Ok(false);
        };

        if new_root.is_valid() {
            self.set_parent(new_root, PageId::INVALID)?;
        }
        self.set_root(new_root)?;
        self.bpm.delete_page(root_id)?;
        debug!("{}: root {} replaced by {}", self.index_id, root_id, new_root);
        Ok(true)
    }

    /// Delete every page of the tree and unregister it from the
    /// index-roots page.
    pub fn destroy(&mut self) -> Result<()> {
        if self.root_page_id.is_valid() {
            self.destroy_subtree(self.root_page_id)?;
        }
        self.root_page_id = PageId::INVALID;

        let mut guard = self.bpm.fetch_page_write(INDEX_ROOTS_PAGE_ID)?;
        IndexRootsPage::open(guard.as_mut_slice())?.delete(self.index_id);
        debug!("{}: destroyed", self.index_id);
        Ok(())
    }

    fn destroy_subtree(&self, page_id: PageId) -> Result<()> {
        let children = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            match TreePage::from_bytes(guard.as_slice())? {
                TreePage::Internal(node) => node.children(),
                TreePage::Leaf(_) => Vec::new(),
            }
        };
        for child in children {
            self.destroy_subtree(child)?;
        }
        self.bpm.delete_page(page_id)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Zero-pad a short key; reject a long one.
    fn fixed_key<'k>(&self, key: &'k [u8]) -> Result<Cow<'k, [u8]>> {
        if key.len() > self.key_size {
            return Err(Error::KeyTooLarge {
                size: key.len(),
                max: self.key_size,
            });
        }
        if key.len() == self.key_size {
            return Ok(Cow::Borrowed(key));
        }
        let mut padded = key.to_vec();
        padded.resize(self.key_size, 0);
        Ok(Cow::Owned(padded))
    }

    /// Allocate a page for a structural change.
    fn new_tree_page(&self, context: &'static str) -> Result<PageWriteGuard<'_>> {
        self.bpm.new_page().map_err(|e| match e {
            Error::NoFreeFrames | Error::OutOfSpace => {
                error!("{}: page allocation failed while {}: {}", self.index_id, context, e);
                Error::OutOfMemory(context)
            }
            other => other,
        })
    }

    fn node_info(&self, page_id: PageId) -> Result<NodeInfo> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        let page = TreePage::from_bytes(guard.as_slice())?;
        let header = page.header();
        Ok(NodeInfo {
            size: header.size(),
            min_size: header.min_size(),
            parent: header.parent_page_id(),
        })
    }

    fn set_parent(&self, child: PageId, parent: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(child)?;
        TreePageView::new(guard.as_mut_slice()).set_parent_page_id(parent);
        Ok(())
    }

    fn separator_at(&self, parent_id: PageId, index: usize) -> Result<Vec<u8>> {
        let guard = self.bpm.fetch_page_read(parent_id)?;
        Ok(InternalPage::new(guard.as_slice()).key_at(index).to_vec())
    }

    fn set_separator_at(&self, parent_id: PageId, index: usize, key: &[u8]) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(parent_id)?;
        InternalPage::new(guard.as_mut_slice()).set_key_at(index, key);
        Ok(())
    }

    /// Record a new root, in memory and in the index-roots page.
    fn set_root(&mut self, root_id: PageId) -> Result<()> {
        self.root_page_id = root_id;
        let mut guard = self.bpm.fetch_page_write(INDEX_ROOTS_PAGE_ID)?;
        let mut roots = IndexRootsPage::open(guard.as_mut_slice())?;
        if roots.update(self.index_id, root_id) || roots.insert(self.index_id, root_id) {
            Ok(())
        } else {
            Err(Error::IndexRootsFull)
        }
    }

    fn mixed_siblings(left_id: PageId, right_id: PageId) -> Error {
        Error::Corruption(format!(
            "siblings {} and {} are of different kinds",
            left_id, right_id
        ))
    }
}
