//! In-memory store for testing.

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::store::LocalStore;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Collection = BTreeMap<String, Record>;

/// An in-memory [`LocalStore`].
///
/// Suitable for unit tests, integration tests and ephemeral data.
/// Records within a collection are returned in id order.
///
/// # Example
///
/// ```rust
/// use agrosync_store::{InMemoryStore, LocalStore, Record};
///
/// let store = InMemoryStore::new();
/// store.put("lots", Record::with_id("l1")).unwrap();
/// assert!(store.get("lots", "l1").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, BTreeMap::len)
    }

    /// Returns true if no collection holds any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.read().values().all(BTreeMap::is_empty)
    }

    /// Removes every record.
    pub fn clear(&self) {
        self.collections.write().clear();
    }
}

impl LocalStore for InMemoryStore {
    fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id).cloned()))
    }

    fn put(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::missing_id(collection))?
            .to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id, record);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .is_some())
    }

    fn collections(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .iter()
            .filter(|(_, c)| !c.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn list_unsynced(&self, collection: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.values().filter(|r| !r.is_synced()).cloned().collect())
            .unwrap_or_default())
    }

    fn mark_synced(&self, collection: &str, id: &str) -> StoreResult<()> {
        if let Some(record) = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
        {
            record.set_synced(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = InMemoryStore::new();
        store.put("farms", Record::with_id("f1").with("name", "North")).unwrap();

        let got = store.get("farms", "f1").unwrap().unwrap();
        assert_eq!(got.get_str("name"), Some("North"));

        assert!(store.delete("farms", "f1").unwrap());
        assert!(!store.delete("farms", "f1").unwrap());
        assert!(store.get("farms", "f1").unwrap().is_none());
    }

    #[test]
    fn put_replaces_same_id() {
        let store = InMemoryStore::new();
        store.put("farms", Record::with_id("f1").with("name", "A")).unwrap();
        store.put("farms", Record::with_id("f1").with("name", "B")).unwrap();

        assert_eq!(store.len("farms"), 1);
        let got = store.get("farms", "f1").unwrap().unwrap();
        assert_eq!(got.get_str("name"), Some("B"));
    }

    #[test]
    fn put_without_id_fails() {
        let store = InMemoryStore::new();
        let err = store.put("farms", Record::new()).unwrap_err();
        assert!(matches!(err, StoreError::MissingId { .. }));
    }

    #[test]
    fn unknown_collection_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.get_all("nothing").unwrap().is_empty());
        assert!(store.list_unsynced("nothing").unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn unsynced_tracking() {
        let store = InMemoryStore::new();
        store.put("lots", Record::with_id("a")).unwrap();
        store.put("lots", Record::with_id("b").with("synced", true)).unwrap();
        store.put("lots", Record::with_id("c").with("synced", false)).unwrap();

        let ids: Vec<_> = store
            .list_unsynced("lots")
            .unwrap()
            .iter()
            .map(|r| r.id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        store.mark_synced("lots", "a").unwrap();
        store.mark_synced("lots", "missing").unwrap();
        assert_eq!(store.list_unsynced("lots").unwrap().len(), 1);
        assert_eq!(store.len("lots"), 3);
    }

    #[test]
    fn mark_synced_keeps_other_fields() {
        let store = InMemoryStore::new();
        store
            .put("lots", Record::with_id("a").with("name", "Lot A"))
            .unwrap();
        store.mark_synced("lots", "a").unwrap();

        let got = store.get("lots", "a").unwrap().unwrap();
        assert!(got.is_synced());
        assert_eq!(got.get_str("name"), Some("Lot A"));
    }

    #[test]
    fn collections_lists_non_empty() {
        let store = InMemoryStore::new();
        store.put("lots", Record::with_id("a")).unwrap();
        store.put("farms", Record::with_id("b")).unwrap();
        store.delete("lots", "a").unwrap();

        assert_eq!(store.collections().unwrap(), vec!["farms".to_string()]);
    }
}
