//! Dump command implementation.

use super::open_store;
use agrosync_store::{validate_collection_name, LocalStore, Record};
use std::io::{self, Write};
use std::path::Path;

/// Selects the records to print.
pub fn select(
    store: &dyn LocalStore,
    collection: &str,
    unsynced: bool,
    limit: Option<usize>,
) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    validate_collection_name(collection)?;
    let records = if unsynced {
        store.list_unsynced(collection)?
    } else {
        store.get_all(collection)?
    };
    Ok(records
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .collect())
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    collection: &str,
    unsynced: bool,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let records = select(&store, collection, unsynced, limit)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrosync_store::InMemoryStore;

    #[test]
    fn filters_and_limits() {
        let store = InMemoryStore::new();
        for id in ["a", "b", "c"] {
            store.put("farms", Record::with_id(id)).unwrap();
        }
        store.mark_synced("farms", "a").unwrap();

        let unsynced = select(&store, "farms", true, None).unwrap();
        assert_eq!(unsynced.len(), 2);

        let limited = select(&store, "farms", false, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id(), Some("a"));
    }

    #[test]
    fn rejects_bad_collection_names() {
        let store = InMemoryStore::new();
        assert!(select(&store, "../etc", false, None).is_err());
    }
}
