//! B+tree index.
//!
//! - [`BPlusTree`] - The tree over raw fixed-size keys
//! - [`IndexIterator`] - Forward scan along the leaf chain
//! - [`BPlusTreeIndex`] - A tree keyed by [`Row`](crate::record::Row)s

mod b_plus_tree_index;
mod iterator;
mod tree;

pub use b_plus_tree_index::BPlusTreeIndex;
pub use iterator::IndexIterator;
pub use tree::BPlusTree;
