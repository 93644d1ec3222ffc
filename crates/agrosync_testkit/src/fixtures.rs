//! Record fixtures and store helpers.
//!
//! Every builder returns a record the way the app would create it offline:
//! a fresh v4 id, `createdAt`/`updatedAt` set to now and `synced = false`.

use agrosync_store::{
    fields, timestamp, FileStore, InMemoryStore, LocalStore, Record, StoreError, StoreResult,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

/// A file-backed store in a temporary directory, removed on drop.
pub struct TestFileStore {
    /// The store instance.
    pub store: FileStore,
    _temp_dir: TempDir,
}

impl TestFileStore {
    /// Creates a store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self {
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFileStore {
    type Target = FileStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary file-backed store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileStore) -> R,
{
    let store = TestFileStore::new();
    f(&store)
}

/// Runs a test with an in-memory store.
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&InMemoryStore) -> R,
{
    let store = InMemoryStore::new();
    f(&store)
}

/// An in-memory store whose writes fail for selected record ids.
///
/// Reads always succeed. `put`, `delete` and `mark_synced` of a failing id
/// return an I/O error and leave the record untouched.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    failing: RwLock<HashSet<String>>,
}

impl FailingStore {
    /// Creates an empty store with no failing ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write to `id` fail until [`heal`](Self::heal) is called.
    pub fn fail_writes_for(&self, id: &str) {
        self.failing.write().insert(id.to_string());
    }

    /// Lets writes to `id` succeed again.
    pub fn heal(&self, id: &str) {
        self.failing.write().remove(id);
    }

    fn check(&self, id: &str) -> StoreResult<()> {
        if self.failing.read().contains(id) {
            return Err(StoreError::Io(io::Error::other("disk full")));
        }
        Ok(())
    }
}

impl LocalStore for FailingStore {
    fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.inner.get_all(collection)
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        self.inner.get(collection, id)
    }

    fn put(&self, collection: &str, record: Record) -> StoreResult<()> {
        if let Some(id) = record.id() {
            self.check(id)?;
        }
        self.inner.put(collection, record)
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.check(id)?;
        self.inner.delete(collection, id)
    }

    fn collections(&self) -> StoreResult<Vec<String>> {
        self.inner.collections()
    }

    fn mark_synced(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check(id)?;
        self.inner.mark_synced(collection, id)
    }
}

/// Returns a new random v4 identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Formats epoch milliseconds as an RFC 3339 string.
pub fn iso(millis: i64) -> String {
    timestamp::format_millis(millis).expect("timestamp out of range")
}

/// Sets both timestamps of `record` to `millis`.
pub fn at(mut record: Record, millis: i64) -> Record {
    let stamp = iso(millis);
    record.set(fields::CREATED_AT, stamp.clone());
    record.set(fields::UPDATED_AT, stamp);
    record
}

/// Returns a copy of `record` marked as already synced.
pub fn synced(mut record: Record) -> Record {
    record.set_synced(true);
    record
}

/// A closed GeoJSON square of side `size` at the origin.
pub fn square_boundary(size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0], [size, 0.0], [size, size], [0.0, size], [0.0, 0.0]]]
    })
}

fn fresh() -> Record {
    let mut record = Record::with_id(new_id());
    record.touch();
    record
}

/// A client.
pub fn client(name: &str) -> Record {
    fresh()
        .with("name", name)
        .with("email", format!("{}@example.com", name.to_lowercase().replace(' ', ".")))
}

/// A farm owned by `client_id`, with a boundary.
pub fn farm(client_id: &str, name: &str) -> Record {
    fresh()
        .with("clientId", client_id)
        .with("name", name)
        .with("area", 120.5)
        .with("boundary", square_boundary(1.0))
}

/// A warehouse on `farm_id`.
pub fn warehouse(farm_id: &str, name: &str) -> Record {
    fresh()
        .with("farmId", farm_id)
        .with("name", name)
        .with("capacity", 500)
}

/// A product.
pub fn product(name: &str, category: &str) -> Record {
    fresh()
        .with("name", name)
        .with("category", category)
        .with("unit", "kg")
        .with("price", 12.75)
}

/// A lot within `farm_id`, with a boundary.
pub fn lot(farm_id: &str, name: &str) -> Record {
    fresh()
        .with("farmId", farm_id)
        .with("name", name)
        .with("area", 14.2)
        .with("crop", "soy")
        .with("boundary", square_boundary(0.1))
}

/// A stock entry.
pub fn stock(product_id: &str, warehouse_id: &str, quantity: i64) -> Record {
    fresh()
        .with("productId", product_id)
        .with("warehouseId", warehouse_id)
        .with("quantity", quantity)
        .with("unit", "kg")
}

/// A pending order for a lot.
pub fn order(client_id: &str, farm_id: &str, lot_id: &str) -> Record {
    fresh()
        .with("clientId", client_id)
        .with("farmId", farm_id)
        .with("lotId", lot_id)
        .with("status", "pending")
        .with("items", json!([{"product": "urea", "quantity": 40}]))
}

/// A stock movement.
pub fn movement(product_id: &str, warehouse_id: &str, quantity: i64) -> Record {
    fresh()
        .with("productId", product_id)
        .with("warehouseId", warehouse_id)
        .with("movementType", if quantity < 0 { "out" } else { "in" })
        .with("quantity", quantity)
        .with("date", timestamp::now_rfc3339())
}

/// A field observation with a point location.
pub fn observation(farm_id: &str, lot_id: &str, text: &str) -> Record {
    fresh()
        .with("farmId", farm_id)
        .with("lotId", lot_id)
        .with("text", text)
        .with("severity", "low")
        .with("location", json!({"type": "Point", "coordinates": [0.05, 0.05]}))
}

/// An activity log entry.
pub fn activity_log(entity_type: &str, entity_id: &str, action: &str) -> Record {
    fresh()
        .with("entityType", entity_type)
        .with("entityId", entity_id)
        .with("action", action)
        .with("details", json!({}))
}

/// One record per collection with valid references between them.
///
/// Returned in parent-first order as `(collection, record)` pairs.
pub fn farm_graph() -> Vec<(&'static str, Record)> {
    let client = client("Acme Farms");
    let client_id = id_of(&client);
    let farm = farm(&client_id, "North");
    let farm_id = id_of(&farm);
    let warehouse = warehouse(&farm_id, "Main shed");
    let warehouse_id = id_of(&warehouse);
    let product = product("Urea", "fertilizer");
    let product_id = id_of(&product);
    let lot = lot(&farm_id, "A1");
    let lot_id = id_of(&lot);
    let stock = stock(&product_id, &warehouse_id, 200);
    let order = order(&client_id, &farm_id, &lot_id);
    let movement = movement(&product_id, &warehouse_id, -40).with("orderId", id_of(&order));
    let observation = observation(&farm_id, &lot_id, "Aphids on the north edge");
    let log = activity_log("lot", &lot_id, "create");

    vec![
        ("clients", client),
        ("farms", farm),
        ("warehouses", warehouse),
        ("products", product),
        ("lots", lot),
        ("stock", stock),
        ("orders", order),
        ("movements", movement),
        ("observations", observation),
        ("activityLogs", log),
    ]
}

fn id_of(record: &Record) -> String {
    record.id().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrosync_store::LocalStore;
    use agrosync_sync_protocol::entities;

    #[test]
    fn fixtures_are_unsynced_with_ids() {
        let record = lot(&new_id(), "A1");
        assert!(!record.is_synced());
        assert_eq!(record.id().map(str::len), Some(36));
        assert!(record.updated_at_millis() > 0);
    }

    #[test]
    fn graph_covers_every_entity() {
        let graph = farm_graph();
        for entity in entities::ALL_ENTITIES {
            assert!(
                graph.iter().any(|(c, _)| *c == entity.collection),
                "no fixture for {}",
                entity.collection
            );
        }
    }

    #[test]
    fn at_sets_both_timestamps() {
        let record = at(client("x"), 1_704_067_200_000);
        assert_eq!(record.get_str("updatedAt"), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(record.updated_at_millis(), 1_704_067_200_000);
    }

    #[test]
    fn failing_store_rejects_writes_until_healed() {
        let store = FailingStore::new();
        let record = client("x");
        let id = record.id().unwrap().to_string();
        store.put("clients", record).unwrap();

        store.fail_writes_for(&id);
        assert!(store.mark_synced("clients", &id).is_err());
        assert!(store.delete("clients", &id).is_err());
        assert_eq!(store.list_unsynced("clients").unwrap().len(), 1);

        store.heal(&id);
        store.mark_synced("clients", &id).unwrap();
        assert!(store.list_unsynced("clients").unwrap().is_empty());
    }

    #[test]
    fn temp_store_round_trip() {
        with_temp_store(|store| {
            let record = farm(&new_id(), "North");
            store.put("farms", record.clone()).unwrap();
            assert_eq!(store.get("farms", record.id().unwrap()).unwrap(), Some(record));
        });
    }
}
