//! Page types and layouts.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - Zero-copy views interpreting a page's bytes:
//!   [`BitmapPage`], [`DiskMetaPage`], [`InternalPage`], [`LeafPage`],
//!   [`IndexRootsPage`] and [`TablePage`]

mod bitmap_page;
mod btree_internal_page;
mod btree_leaf_page;
mod btree_page;
mod disk_meta_page;
mod index_roots_page;
#[allow(clippy::module_inception)]
mod page;
mod table_page;

pub use bitmap_page::BitmapPage;
pub use btree_internal_page::{InternalPage, INTERNAL_PAGE_HEADER_SIZE};
pub use btree_leaf_page::{LeafPage, LEAF_PAGE_HEADER_SIZE};
pub use btree_page::{
    IndexPageType, TreePage, TreePageHeader, TreePageHeaderMut, TreePageView,
    TREE_PAGE_HEADER_SIZE,
};
pub use disk_meta_page::DiskMetaPage;
pub use index_roots_page::{IndexRootsPage, MAX_INDEX_ROOTS};
pub use page::Page;
pub use table_page::{TablePage, UpdateResult, MAX_TUPLE_SIZE, TABLE_PAGE_HEADER_SIZE};
