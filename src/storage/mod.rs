//! Storage layer - disk I/O, page formats and table heaps.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Page allocation and file I/O
//! - [`page`] - Page types and layouts
//! - [`TableHeap`] - Rows stored in a linked list of table pages

mod disk_manager;
pub mod page;
mod table_heap;
mod table_iterator;

pub use disk_manager::DiskManager;
pub use table_heap::TableHeap;
pub use table_iterator::TableIterator;
