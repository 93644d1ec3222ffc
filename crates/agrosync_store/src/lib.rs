//! # AgroSync Store
//!
//! Local record store contract and implementations for AgroSync.
//!
//! This crate provides the lowest layer the sync engine talks to:
//! - [`Record`]: a JSON document with the shared sync fields
//!   (`id`, `createdAt`, `updatedAt`, `synced`, tombstone fields)
//! - [`LocalStore`]: the record-oriented contract (get/put/delete/list)
//!   including the change-tracking operations `list_unsynced` and `mark_synced`
//! - [`InMemoryStore`]: for tests and ephemeral data
//! - [`FileStore`]: one JSON file per collection, guarded by a directory lock
//!
//! ## Design Principles
//!
//! - Stores own record storage; callers read a batch and discard it
//! - A single-record read-modify-write is atomic at the store layer
//! - Stores are `Send + Sync` so the sync engine can share them across tasks
//!
//! ## Example
//!
//! ```rust
//! use agrosync_store::{InMemoryStore, LocalStore, Record};
//!
//! let store = InMemoryStore::new();
//! store.put("farms", Record::with_id("f1").with("name", "North")).unwrap();
//!
//! assert_eq!(store.list_unsynced("farms").unwrap().len(), 1);
//! store.mark_synced("farms", "f1").unwrap();
//! assert!(store.list_unsynced("farms").unwrap().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod record;
mod store;
pub mod timestamp;

pub use error::{StoreError, StoreResult};
pub use file::{FileStore, FileStoreOptions};
pub use memory::InMemoryStore;
pub use record::{fields, Record};
pub use store::{validate_collection_name, LocalStore};
