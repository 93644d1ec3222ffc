//! The reference server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::schema::TableSchema;
use agrosync_store::timestamp;
use agrosync_sync_protocol::{
    ChangeEvent, ChangeType, EntityDef, RemoteError, RemoteRow, ALL_ENTITIES,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

type Table = BTreeMap<String, RemoteRow>;

/// An in-memory relational backend with a realtime change feed.
///
/// Tables and their columns come from entity field tables. Upserts are
/// validated the way PostgREST validates them and every change is broadcast
/// to subscribers.
///
/// # Example
///
/// ```
/// use agrosync_sync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// assert!(server.has_active_session());
/// assert_eq!(server.row_count("farms"), Some(0));
/// ```
pub struct SyncServer {
    schemas: HashMap<&'static str, TableSchema>,
    tables: RwLock<HashMap<&'static str, Table>>,
    session: AtomicBool,
    events: broadcast::Sender<ChangeEvent>,
}

impl SyncServer {
    /// Creates a server with a table for every farm entity.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_entities(config, ALL_ENTITIES.iter().copied())
    }

    /// Creates a server with a table for each of `entities`.
    pub fn with_entities<'a>(
        config: ServerConfig,
        entities: impl IntoIterator<Item = &'a EntityDef>,
    ) -> Self {
        let schemas: HashMap<_, _> = entities
            .into_iter()
            .map(|e| (e.table, TableSchema::from_entity(e)))
            .collect();
        let tables = schemas.keys().map(|name| (*name, Table::new())).collect();
        let (events, _) = broadcast::channel(config.realtime_capacity.max(1));
        Self {
            schemas,
            tables: RwLock::new(tables),
            session: AtomicBool::new(config.start_signed_in),
            events,
        }
    }

    /// Returns the schema of a table.
    pub fn schema(&self, table: &str) -> Option<&TableSchema> {
        self.schemas.get(table)
    }

    /// Returns the table names, sorted.
    pub fn table_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.schemas.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn schema_or_unknown(&self, table: &str) -> ServerResult<&TableSchema> {
        self.schemas
            .get(table)
            .ok_or_else(|| ServerError::UnknownTable(table.to_string()))
    }

    /// Inserts a row or merges it into the existing row with the same id.
    ///
    /// Columns absent from `row` keep their stored values. Missing
    /// `created_at`/`updated_at` on insert default to now.
    ///
    /// # Errors
    ///
    /// [`ServerError::UnknownTable`] or [`ServerError::Rejected`] with the
    /// schema violation.
    pub fn upsert(&self, table: &str, row: RemoteRow) -> ServerResult<ChangeType> {
        let schema = self.schema_or_unknown(table)?;
        schema.validate(&row).map_err(ServerError::Rejected)?;
        let Some(id) = row.get("id").and_then(Value::as_str).map(str::to_string) else {
            return Err(ServerError::Rejected(
                RemoteError::with_code("23502", "id must be a string"),
            ));
        };

        let event = {
            let mut tables = self.tables.write();
            let rows = tables.entry(schema.name()).or_default();
            match rows.get_mut(&id) {
                Some(existing) => {
                    let old = existing.clone();
                    existing.extend(row);
                    ChangeEvent::update(table, existing.clone(), Some(old))
                }
                None => {
                    let mut stored = row;
                    for column in ["created_at", "updated_at"] {
                        stored
                            .entry(column)
                            .or_insert_with(|| Value::String(timestamp::now_rfc3339()));
                    }
                    rows.insert(id.clone(), stored.clone());
                    ChangeEvent::insert(table, stored)
                }
            }
        };

        let kind = event.event_type;
        debug!(table = %table, id = %id, event = ?kind, "upserted row");
        self.broadcast(event);
        Ok(kind)
    }

    /// Hard-deletes a row. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// [`ServerError::UnknownTable`].
    pub fn delete_row(&self, table: &str, id: &str) -> ServerResult<bool> {
        let schema = self.schema_or_unknown(table)?;
        let removed = self
            .tables
            .write()
            .get_mut(schema.name())
            .and_then(|rows| rows.remove(id));
        match removed {
            Some(old) => {
                debug!(table = %table, id = %id, "deleted row");
                self.broadcast(ChangeEvent::delete(table, old));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns every row of a table, ordered by id.
    ///
    /// # Errors
    ///
    /// [`ServerError::UnknownTable`].
    pub fn select_all(&self, table: &str) -> ServerResult<Vec<RemoteRow>> {
        let schema = self.schema_or_unknown(table)?;
        Ok(self
            .tables
            .read()
            .get(schema.name())
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns one row.
    pub fn get_row(&self, table: &str, id: &str) -> Option<RemoteRow> {
        self.tables.read().get(table).and_then(|rows| rows.get(id).cloned())
    }

    /// Returns the number of rows, or `None` for an unknown table.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.read().get(table).map(BTreeMap::len)
    }

    /// Starts a session.
    pub fn sign_in(&self) {
        self.session.store(true, Ordering::SeqCst);
    }

    /// Ends the session.
    pub fn sign_out(&self) {
        self.session.store(false, Ordering::SeqCst);
    }

    /// Returns true while signed in.
    pub fn has_active_session(&self) -> bool {
        self.session.load(Ordering::SeqCst)
    }

    /// Subscribes to the change feed of every table.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn broadcast(&self, event: ChangeEvent) {
        // No subscribers is not an error.
        if let Ok(receivers) = self.events.send(event) {
            trace!(receivers, "broadcast change");
        }
    }
}

impl std::fmt::Debug for SyncServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServer")
            .field("tables", &self.table_names())
            .field("signed_in", &self.has_active_session())
            .finish()
    }
}
