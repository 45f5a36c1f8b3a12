//! Storage abstraction and implementations for rackflow.
//!
//! This crate provides a trait-based interface over the inventory and the
//! live resource state, an in-memory reference implementation, and the
//! bounded activity log shown to operators.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod activity;
pub mod snapshot;

pub use trait_::{Storage, StorageError, Result};
pub use memory::MemoryStorage;
pub use activity::{ActivityLog, DEFAULT_CAPACITY};
pub use snapshot::{SlotEntry, WorldSnapshot};
