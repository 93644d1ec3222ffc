//! Error types for the sync engine.

use agrosync_store::StoreError;
use agrosync_sync_protocol::RemoteError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The remote backend rejected a request.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A remote call or a whole cycle exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The realtime feed could not be established.
    #[error("realtime error: {0}")]
    Realtime(String),

    /// The engine was shut down.
    #[error("sync engine has been shut down")]
    ShutDown,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the next cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Remote(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Remote(RemoteError::new("503")).is_retryable());
        assert!(!SyncError::ShutDown.is_retryable());
        assert!(!SyncError::Realtime("feed unavailable".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Remote(RemoteError::with_code("42P01", "no such table"));
        assert_eq!(err.to_string(), "remote error: [42P01] no such table");

        let err: SyncError = StoreError::missing_id("lots").into();
        assert!(err.to_string().starts_with("store error:"));
    }
}
