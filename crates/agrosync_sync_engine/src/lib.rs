//! # AgroSync Sync Engine
//!
//! Offline-first synchronization between a local store and a remote
//! relational backend.
//!
//! This crate provides:
//! - Push engine: uploads unsynced records one upsert at a time
//! - Pull engine: merges full remote snapshots under last-write-wins
//! - Realtime merge handler: applies remote change notifications as they arrive
//! - Sync orchestrator with single-flight cycles and observable status
//! - [`RemoteBackend`] abstraction and an in-memory [`MockBackend`]
//!
//! ## Architecture
//!
//! A cycle is **push-then-pull**:
//! 1. Push every unsynced record of every registered collection
//! 2. Pull every registered table and merge it locally
//!
//! Push runs first so local edits made offline reach the remote before a
//! snapshot could overwrite them with older data.
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at a time; overlapping calls are skipped
//! - A record is marked synced only after the remote accepted it
//! - A remote copy replaces a local one only if strictly newer
//! - Pull never deletes local records
//! - Status reverts from success or error to idle after a delay, unless a
//!   newer cycle has started

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod pull;
mod push;
mod realtime;
mod registry;
mod state;
mod transport;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use pull::{pull_collection, PullReport, RemoteMerger, RowMerge};
pub use push::{push_collection, PushReport};
pub use realtime::{apply_change_event, spawn_realtime, EventOutcome, RealtimeHandle};
pub use registry::{CollectionBinding, MapperRegistry};
pub use state::{CycleOutcome, StatusSubscription, SyncCycleResult, SyncStats, SyncStatus};
pub use transport::{MockBackend, RemoteBackend};
