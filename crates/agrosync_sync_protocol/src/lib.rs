//! # AgroSync Sync Protocol
//!
//! Entity mapping, change feed types and merge rules for AgroSync.
//!
//! This crate provides:
//! - [`EntityMapper`] and the declarative [`EntityDef`] field tables for
//!   every synced collection
//! - [`ChangeEvent`] for the realtime change feed
//! - [`merge_remote`], the last-write-wins rule with non-regressable fields
//! - [`RejectionClassifier`] for remote upsert failures
//! - [`ReferenceValidator`] for detecting corrupt identifiers
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod conflict;
pub mod entities;
mod mapper;
mod rejection;
mod validation;

pub use change_feed::{ChangeEvent, ChangeType};
pub use conflict::{is_empty_value, merge_remote, remote_wins, MergeOutcome};
pub use entities::ALL_ENTITIES;
pub use mapper::{
    coerce, EntityDef, EntityMapper, FieldDefault, FieldKind, FieldSpec, RemoteRow, BASE_FIELDS,
};
pub use rejection::{RejectionClassifier, RejectionKind, RemoteError};
pub use validation::{invalid_reference_fields, ReferenceValidator, UuidReferenceValidator};
