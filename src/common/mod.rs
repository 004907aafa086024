//! Common types and utilities shared across ministore.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`StorageConfig`]
//! - Error types
//! - Identifiers (PageId, FrameId, RowId, IndexId)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;
mod row_id;

pub use config::StorageConfig;
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
pub use row_id::{IndexId, RowId};
