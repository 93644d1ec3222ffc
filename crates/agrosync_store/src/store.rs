//! Local store trait definition.

use crate::error::{StoreError, StoreResult};
use crate::record::Record;

/// The record-oriented contract the sync engine relies on.
///
/// Implementations hold named collections of [`Record`]s keyed by `id`.
///
/// # Invariants
///
/// - `put` replaces any record with the same id
/// - `delete` of an absent record is a no-op
/// - `mark_synced` of an absent record is a no-op
/// - `list_unsynced` returns exactly the records whose `synced` flag is not `true`
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`.
pub trait LocalStore: Send + Sync {
    /// Returns every record in a collection. Unknown collections are empty.
    fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// Returns one record by id.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>>;

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingId`] if the record has no id.
    fn put(&self, collection: &str, record: Record) -> StoreResult<()>;

    /// Removes a record. Returns true if a record was removed.
    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Returns the names of all non-empty collections.
    fn collections(&self) -> StoreResult<Vec<String>>;

    /// Returns the records that still need to be pushed.
    fn list_unsynced(&self, collection: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .get_all(collection)?
            .into_iter()
            .filter(|r| !r.is_synced())
            .collect())
    }

    /// Marks a record as acknowledged by the remote.
    ///
    /// Only the `synced` flag changes. Implementations should override this
    /// when they can do the read-modify-write under a single lock.
    fn mark_synced(&self, collection: &str, id: &str) -> StoreResult<()> {
        if let Some(mut record) = self.get(collection, id)? {
            if !record.is_synced() {
                record.set_synced(true);
                self.put(collection, record)?;
            }
        }
        Ok(())
    }
}

/// Checks that a collection name is usable as a storage key.
///
/// Names must be non-empty ASCII alphanumerics, `_` or `-`.
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names() {
        assert!(validate_collection_name("farms").is_ok());
        assert!(validate_collection_name("activityLogs").is_ok());
        assert!(validate_collection_name("activity_logs-2").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("../etc").is_err());
        assert!(validate_collection_name("a b").is_err());
    }
}
