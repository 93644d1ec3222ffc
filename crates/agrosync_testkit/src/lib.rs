//! # AgroSync Testkit
//!
//! Test utilities for AgroSync.
//!
//! This crate provides:
//! - Record fixtures for every synced farm entity
//! - Temporary file-backed stores
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agrosync_testkit::prelude::*;
//!
//! #[test]
//! fn lot_belongs_to_farm() {
//!     let farm = farm(&new_id(), "North");
//!     let lot = lot(farm.id().unwrap(), "A1");
//!     assert_eq!(lot.get_str("farmId"), farm.id());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
