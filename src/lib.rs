//! ministore - The storage core of a single-node relational database.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        StorageEngine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────┐   ┌──────────────────────────┐   │
//! │  │     Index Layer (index/)  │   │   Table Heap (storage/)  │   │
//! │  │  BPlusTree + IndexIterator│   │ TableHeap + TableIterator│   │
//! │  │  KeyManager (record/)     │   │ Row / Schema (record/)   │   │
//! │  └─────────────┬─────────────┘   └────────────┬─────────────┘   │
//! │                └──────────────┬───────────────┘                 │
//! │                               ↓                                 │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Buffer Pool (buffer/)                              │   │
//! │  │   BufferPoolManager + Frame + page guards + Statistics   │   │
//! │  │   Replacer trait, LRU policy                             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                               ↓                                 │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │   DiskManager: meta page + bitmap extents + data pages   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, RowId, Error, config)
//! - [`buffer`] - Buffer pool management and page replacement
//! - [`storage`] - Disk I/O, page formats and table heaps
//! - [`index`] - Key comparison and the B+tree index
//! - [`record`] - Columns, schemas and rows
//! - [`engine`] - The [`StorageEngine`] context
//!
//! # Quick Start
//! ```no_run
//! use ministore::{BufferPoolManager, DiskManager};
//!
//! // Create a new database file and put a pool of 64 frames over it
//! let dm = DiskManager::create("my_database.db").unwrap();
//! let bpm = BufferPoolManager::new(64, dm);
//!
//! // Allocate a page and write to it; the guard unpins on drop
//! let mut guard = bpm.new_page().unwrap();
//! guard.as_mut_slice()[0] = 0xFF;
//! ```

pub mod buffer;
pub mod common;
pub mod engine;
pub mod index;
pub mod record;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, IndexId, PageId, Result, RowId, StorageConfig};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use engine::StorageEngine;
pub use index::{BPlusTree, BPlusTreeIndex, IndexIterator};
pub use storage::page::Page;
pub use storage::{DiskManager, TableHeap};
