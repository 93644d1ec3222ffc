//! File-based store for persistent local data.
//!
//! Directory layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ farms.json        # One JSON array per collection, sorted by id
//! └─ lots.json
//! ```

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::store::{validate_collection_name, LocalStore};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const COLLECTION_EXT: &str = "json";
const TEMP_EXT: &str = "json.tmp";

type Collection = BTreeMap<String, Record>;

/// Options for opening a [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Create the directory if it does not exist.
    pub create_if_missing: bool,
    /// Call `fsync` before renaming a rewritten collection file into place.
    pub sync_on_write: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
        }
    }
}

impl FileStoreOptions {
    /// Sets whether a missing directory is created.
    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets whether writes are fsynced.
    #[must_use]
    pub fn sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }
}

/// A [`LocalStore`] persisted as one JSON file per collection.
///
/// Collections are loaded lazily on first access and cached. Every mutation
/// rewrites the collection file through a temp file and an atomic rename, so
/// a crash leaves either the old or the new contents on disk.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on its directory. Only one
/// `FileStore` can be open per directory at a time; within the process the
/// store is safe to share across threads.
///
/// # Example
///
/// ```no_run
/// use agrosync_store::{FileStore, LocalStore, Record};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("agro_data")).unwrap();
/// store.put("farms", Record::with_id("f1")).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    options: FileStoreOptions,
    cache: RwLock<HashMap<String, Collection>>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store directory with default options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the directory.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_options(path, FileStoreOptions::default())
    }

    /// Opens a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock
    /// - I/O errors occur
    pub fn open_with_options(path: &Path, options: FileStoreOptions) -> StoreResult<Self> {
        if !path.exists() {
            if options.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", path.display()),
                )));
            }
        }
        if !path.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), "opened file store");
        Ok(Self {
            path: path.to_path_buf(),
            options,
            cache: RwLock::new(HashMap::new()),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{name}.{COLLECTION_EXT}"))
    }

    fn load(&self, name: &str) -> StoreResult<Collection> {
        let path = self.collection_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Collection::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Collection::new());
        }

        let records: Vec<Record> = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::corrupted(&path, e.to_string()))?;
        let mut collection = Collection::new();
        for record in records {
            match record.id() {
                Some(id) => {
                    collection.insert(id.to_string(), record);
                }
                None => warn!(collection = name, "dropping stored record without id"),
            }
        }
        Ok(collection)
    }

    fn persist(&self, name: &str, collection: &Collection) -> StoreResult<()> {
        let path = self.collection_path(name);
        let temp = self.path.join(format!("{name}.{TEMP_EXT}"));
        let records: Vec<&Record> = collection.values().collect();
        let bytes = serde_json::to_vec_pretty(&records)?;

        let mut file = File::create(&temp)?;
        file.write_all(&bytes)?;
        if self.options.sync_on_write {
            file.sync_all()?;
        }
        drop(file);
        fs::rename(&temp, &path)?;
        Ok(())
    }

    /// Runs `f` against a collection, loading it into the cache if needed.
    fn read_collection<R>(&self, name: &str, f: impl FnOnce(&Collection) -> R) -> StoreResult<R> {
        validate_collection_name(name)?;
        if let Some(collection) = self.cache.read().get(name) {
            return Ok(f(collection));
        }
        let mut cache = self.cache.write();
        let collection = match cache.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.load(name)?),
        };
        Ok(f(collection))
    }

    /// Applies `f` to a collection and persists it if `f` reports a change.
    fn mutate_collection<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Collection) -> (R, bool),
    ) -> StoreResult<R> {
        validate_collection_name(name)?;
        let mut cache = self.cache.write();
        let collection = match cache.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.load(name)?),
        };
        let (result, changed) = f(collection);
        if changed {
            if let Err(e) = self.persist(name, collection) {
                // Reload from disk on next access.
                cache.remove(name);
                return Err(e);
            }
        }
        Ok(result)
    }
}

impl LocalStore for FileStore {
    fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.read_collection(collection, |c| c.values().cloned().collect())
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        self.read_collection(collection, |c| c.get(id).cloned())
    }

    fn put(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::missing_id(collection))?
            .to_string();
        self.mutate_collection(collection, |c| {
            c.insert(id, record);
            ((), true)
        })
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.mutate_collection(collection, |c| {
            let removed = c.remove(id).is_some();
            (removed, removed)
        })
    }

    fn collections(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_collection_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        for (name, collection) in self.cache.read().iter() {
            if !collection.is_empty() && !names.contains(name) {
                names.push(name.clone());
            }
        }

        let mut non_empty = Vec::with_capacity(names.len());
        for name in names {
            if !self.read_collection(&name, BTreeMap::is_empty)? {
                non_empty.push(name);
            }
        }
        non_empty.sort();
        Ok(non_empty)
    }

    fn list_unsynced(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.read_collection(collection, |c| {
            c.values().filter(|r| !r.is_synced()).cloned().collect()
        })
    }

    fn mark_synced(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.mutate_collection(collection, |c| match c.get_mut(id) {
            Some(record) if !record.is_synced() => {
                record.set_synced(true);
                ((), true)
            }
            _ => ((), false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put("farms", Record::with_id("f2").with("name", "South")).unwrap();
            store.put("farms", Record::with_id("f1").with("name", "North")).unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let ids: Vec<_> = store
            .get_all("farms")
            .unwrap()
            .iter()
            .map(|r| r.id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = FileStore::open(dir.path()).unwrap();
        let err = FileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));
    }

    #[test]
    fn missing_directory_without_create() {
        let dir = tempdir().unwrap();
        let options = FileStoreOptions::default().create_if_missing(false);
        let result = FileStore::open_with_options(&dir.path().join("absent"), options);
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn mark_synced_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put("lots", Record::with_id("a")).unwrap();
            store.put("lots", Record::with_id("b")).unwrap();
            store.mark_synced("lots", "a").unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let unsynced = store.list_unsynced("lots").unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id(), Some("b"));
    }

    #[test]
    fn delete_rewrites_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("lots", Record::with_id("a")).unwrap();
        assert!(store.delete("lots", "a").unwrap());

        let text = fs::read_to_string(dir.path().join("lots.json")).unwrap();
        assert_eq!(text.trim(), "[]");
        assert!(store.collections().unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_collection_names() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let err = store.put("../escape", Record::with_id("a")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidCollection { .. }));
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("farms.json"), b"{not json").unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let err = store.get_all("farms").unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }

    #[test]
    fn collections_lists_files_and_cache() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put("farms", Record::with_id("a")).unwrap();
        store.put("activityLogs", Record::with_id("b")).unwrap();

        assert_eq!(
            store.collections().unwrap(),
            vec!["activityLogs".to_string(), "farms".to_string()]
        );
    }
}
