//! Remote backend abstraction.

use crate::error::{SyncError, SyncResult};
use agrosync_store::fields;
use agrosync_sync_protocol::{ChangeEvent, RemoteError, RemoteRow};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// A shared relational backend the engine pushes to and pulls from.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP/PostgREST, in-process test servers, mocks).
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Returns every row of a table.
    async fn select_all(&self, table: &str) -> SyncResult<Vec<RemoteRow>>;

    /// Inserts or updates a row keyed by its `id` column.
    async fn upsert(&self, table: &str, row: RemoteRow) -> Result<(), RemoteError>;

    /// Returns true if an authenticated session is active.
    async fn has_active_session(&self) -> bool;

    /// Subscribes to row change notifications for all tables.
    fn subscribe(&self) -> SyncResult<broadcast::Receiver<ChangeEvent>>;
}

/// A mock backend for testing.
///
/// Upserted rows are kept per table and returned by `select_all`, so a push
/// followed by a pull observes its own writes.
pub struct MockBackend {
    tables: RwLock<HashMap<String, Vec<RemoteRow>>>,
    upserts: Mutex<Vec<(String, RemoteRow)>>,
    upsert_failures: RwLock<HashMap<String, RemoteError>>,
    select_failures: RwLock<HashMap<String, String>>,
    session: AtomicBool,
    realtime_available: AtomicBool,
    delay: RwLock<Option<Duration>>,
    select_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    events: broadcast::Sender<ChangeEvent>,
}

impl MockBackend {
    /// Creates a mock backend with an active session.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            tables: RwLock::new(HashMap::new()),
            upserts: Mutex::new(Vec::new()),
            upsert_failures: RwLock::new(HashMap::new()),
            select_failures: RwLock::new(HashMap::new()),
            session: AtomicBool::new(true),
            realtime_available: AtomicBool::new(true),
            delay: RwLock::new(None),
            select_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            events,
        }
    }

    /// Replaces the rows returned for a table.
    pub fn set_rows(&self, table: &str, rows: Vec<RemoteRow>) {
        self.tables.write().insert(table.to_string(), rows);
    }

    /// Returns the rows currently held for a table.
    pub fn rows(&self, table: &str) -> Vec<RemoteRow> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    /// Makes every upsert of the row with this id fail with `error`.
    pub fn set_upsert_failure(&self, id: &str, error: RemoteError) {
        self.upsert_failures.write().insert(id.to_string(), error);
    }

    /// Removes an injected upsert failure.
    pub fn clear_upsert_failure(&self, id: &str) {
        self.upsert_failures.write().remove(id);
    }

    /// Makes `select_all` on a table fail with a retryable transport error.
    pub fn set_select_failure(&self, table: &str, message: &str) {
        self.select_failures
            .write()
            .insert(table.to_string(), message.to_string());
    }

    /// Sets whether a session is active.
    pub fn set_session(&self, active: bool) {
        self.session.store(active, Ordering::SeqCst);
    }

    /// Sets whether `subscribe` succeeds.
    pub fn set_realtime_available(&self, available: bool) {
        self.realtime_available.store(available, Ordering::SeqCst);
    }

    /// Delays every remote call by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Sends a change event to every subscriber. Returns the subscriber count.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Returns the successfully upserted rows in call order.
    pub fn upserts(&self) -> Vec<(String, RemoteRow)> {
        self.upserts.lock().clone()
    }

    /// Returns the number of `upsert` calls, including failed ones.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of `select_all` calls.
    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Resets call counters and the upsert log.
    pub fn reset_calls(&self) {
        self.upsert_calls.store(0, Ordering::SeqCst);
        self.select_calls.store(0, Ordering::SeqCst);
        self.upserts.lock().clear();
    }

    async fn maybe_delay(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteBackend for MockBackend {
    async fn select_all(&self, table: &str) -> SyncResult<Vec<RemoteRow>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        let failure = self.select_failures.read().get(table).cloned();
        if let Some(message) = failure {
            return Err(SyncError::transport_retryable(message));
        }
        Ok(self.rows(table))
    }

    async fn upsert(&self, table: &str, row: RemoteRow) -> Result<(), RemoteError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        let id = row
            .get(fields::ID)
            .and_then(Value::as_str)
            .map(str::to_string);
        let failure = id
            .as_deref()
            .and_then(|id| self.upsert_failures.read().get(id).cloned());
        if let Some(error) = failure {
            return Err(error);
        }

        {
            let mut tables = self.tables.write();
            let rows = tables.entry(table.to_string()).or_default();
            let existing = rows
                .iter_mut()
                .find(|r| r.get(fields::ID).and_then(Value::as_str) == id.as_deref());
            match existing {
                Some(existing) => *existing = row.clone(),
                None => rows.push(row.clone()),
            }
        }
        self.upserts.lock().push((table.to_string(), row));
        Ok(())
    }

    async fn has_active_session(&self) -> bool {
        self.session.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> SyncResult<broadcast::Receiver<ChangeEvent>> {
        if self.realtime_available.load(Ordering::SeqCst) {
            Ok(self.events.subscribe())
        } else {
            Err(SyncError::Realtime("realtime channel unavailable".into()))
        }
    }
}
