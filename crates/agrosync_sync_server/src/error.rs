//! Error types for the reference server.

use agrosync_sync_protocol::RemoteError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the reference server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The table does not exist.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The row was rejected by the table schema.
    #[error("rejected: {0}")]
    Rejected(RemoteError),
}

impl ServerError {
    /// Converts to the error a PostgREST client would see.
    pub fn into_remote(self) -> RemoteError {
        match self {
            ServerError::UnknownTable(table) => RemoteError::with_code(
                "42P01",
                format!("relation \"public.{table}\" does not exist"),
            )
            .status(404),
            ServerError::Rejected(error) => error,
        }
    }
}

impl From<ServerError> for RemoteError {
    fn from(error: ServerError) -> Self {
        error.into_remote()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_table_maps_to_undefined_relation() {
        let remote: RemoteError = ServerError::UnknownTable("crops".into()).into();
        assert_eq!(remote.code.as_deref(), Some("42P01"));
        assert_eq!(remote.status, Some(404));
        assert!(remote.message.contains("public.crops"));
    }

    #[test]
    fn rejection_passes_through() {
        let inner = RemoteError::with_code("23502", "null value");
        let remote = ServerError::Rejected(inner.clone()).into_remote();
        assert_eq!(remote, inner);
    }
}
