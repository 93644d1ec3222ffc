//! Error types for store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A collection file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record without a usable `id` was written.
    #[error("record written to collection {collection} has no id")]
    MissingId {
        /// The target collection.
        collection: String,
    },

    /// The collection name cannot be used as a storage key.
    #[error("invalid collection name: {name:?}")]
    InvalidCollection {
        /// The rejected name.
        name: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access to {path:?}")]
    Locked {
        /// The store directory.
        path: PathBuf,
    },

    /// A collection file is corrupted.
    #[error("collection file {path:?} corrupted: {message}")]
    Corrupted {
        /// The offending file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },
}

impl StoreError {
    /// Creates a missing id error.
    pub fn missing_id(collection: impl Into<String>) -> Self {
        Self::MissingId {
            collection: collection.into(),
        }
    }

    /// Creates a corrupted file error.
    pub fn corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            message: message.into(),
        }
    }
}
