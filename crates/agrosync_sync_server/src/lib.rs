//! # AgroSync Sync Server
//!
//! Reference in-memory backend for AgroSync.
//!
//! This crate provides:
//! - Relational tables whose columns are derived from the entity field tables
//! - Upserts validated with PostgREST-style error codes
//! - A realtime change feed of `INSERT`, `UPDATE` and `DELETE` events
//! - A session flag toggled by `sign_in`/`sign_out`
//!
//! # Error codes
//!
//! | Condition | Code |
//! |-----------|------|
//! | unknown column | `PGRST204` |
//! | null in a not-null column | `23502` |
//! | malformed uuid, number or boolean | `22P02` |
//! | malformed timestamp | `22007` |
//! | unknown table | `42P01` |
//!
//! The sync engine's integration tests drive this server through an adapter
//! implementing `RemoteBackend`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod schema;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use schema::{Column, ColumnType, TableSchema};
pub use server::SyncServer;
