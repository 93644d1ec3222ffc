//! Sync orchestrator.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pull::{pull_collection, PullReport, RemoteMerger};
use crate::push::{push_collection, PushReport};
use crate::realtime::{spawn_realtime, RealtimeHandle};
use crate::registry::MapperRegistry;
use crate::state::{
    CycleOutcome, StatusBroadcaster, StatusSubscription, SyncCycleResult, SyncStats, SyncStatus,
};
use crate::transport::RemoteBackend;
use agrosync_store::LocalStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The sync engine keeps a local store consistent with a remote backend.
///
/// A cycle pushes every registered collection, then pulls every registered
/// collection, in registration order. At most one cycle runs at a time;
/// concurrent invocations return [`CycleOutcome::Skipped`].
///
/// Cloning is cheap and every clone drives the same engine.
pub struct SyncEngine<B: RemoteBackend + 'static, S: LocalStore + 'static> {
    inner: Arc<Inner<B, S>>,
}

struct Inner<B, S> {
    config: SyncConfig,
    backend: Arc<B>,
    store: Arc<S>,
    registry: MapperRegistry,
    merger: Arc<RemoteMerger>,
    status: Arc<StatusBroadcaster>,
    syncing: AtomicBool,
    shut_down: AtomicBool,
    stats: RwLock<SyncStats>,
    realtime: Mutex<Option<RealtimeHandle>>,
}

impl<B: RemoteBackend + 'static, S: LocalStore + 'static> Clone for SyncEngine<B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Holds the single-flight flag for one cycle.
///
/// Dropping it clears the flag, even on panic or cancellation. A cycle
/// dropped while `syncing` is still published publishes `idle` first.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
    status: &'a StatusBroadcaster,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a StatusBroadcaster) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, status })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.status.status() == SyncStatus::Syncing {
            warn!("sync cycle abandoned before completion");
            self.status.publish(SyncStatus::Idle);
        }
        self.flag.store(false, Ordering::Release);
    }
}

impl<B: RemoteBackend + 'static, S: LocalStore + 'static> SyncEngine<B, S> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, backend: Arc<B>, store: Arc<S>, registry: MapperRegistry) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                backend,
                store,
                registry,
                merger: Arc::new(RemoteMerger::new()),
                status: Arc::new(StatusBroadcaster::new()),
                syncing: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                stats: RwLock::new(SyncStats::default()),
                realtime: Mutex::new(None),
            }),
        }
    }

    /// Gets the current status.
    pub fn status(&self) -> SyncStatus {
        self.inner.status.status()
    }

    /// Returns true while a cycle is running.
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Returns the registered collections.
    pub fn registry(&self) -> &MapperRegistry {
        &self.inner.registry
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// Returns the remote backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.inner.backend
    }

    /// Registers a status listener.
    ///
    /// The listener runs synchronously on the task that changes the status,
    /// so it should return quickly.
    pub fn on_status_change<F>(&self, listener: F) -> StatusSubscription
    where
        F: Fn(SyncStatus) + Send + Sync + 'static,
    {
        let id = self.inner.status.subscribe(Arc::new(listener));
        StatusSubscription::new(id, &self.inner.status)
    }

    /// Runs one push-then-pull cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ShutDown`] after [`shutdown`](Self::shutdown),
    /// otherwise any error that escaped per-record containment (after
    /// publishing [`SyncStatus::Error`]).
    pub async fn sync(&self) -> SyncResult<CycleOutcome> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(SyncError::ShutDown);
        }
        let Some(_guard) = CycleGuard::acquire(&self.inner.syncing, &self.inner.status) else {
            debug!("sync already in progress, skipping");
            self.inner.stats.write().cycles_skipped += 1;
            return Ok(CycleOutcome::Skipped);
        };

        let generation = self.inner.status.begin_cycle();
        self.inner.status.publish(SyncStatus::Syncing);

        let session = tokio::time::timeout(
            self.inner.config.request_timeout,
            self.inner.backend.has_active_session(),
        )
        .await;
        match session {
            Ok(true) => {}
            Ok(false) => {
                info!("no active session, skipping sync");
                self.inner.status.publish(SyncStatus::Idle);
                return Ok(CycleOutcome::NoSession);
            }
            Err(_) => {
                let e = SyncError::Timeout;
                self.finish_with_error(generation, &e);
                return Err(e);
            }
        }

        info!(collections = self.inner.registry.len(), "sync cycle started");
        let start = Instant::now();
        let result = tokio::time::timeout(self.inner.config.cycle_timeout, self.run_cycle())
            .await
            .unwrap_or(Err(SyncError::Timeout));

        match result {
            Ok((push, pull)) => {
                let result = SyncCycleResult {
                    push,
                    pull,
                    duration: start.elapsed(),
                };
                {
                    let mut stats = self.inner.stats.write();
                    stats.cycles_completed += 1;
                    stats.records_pushed += result.push.pushed as u64;
                    stats.records_pulled += (result.pull.inserted + result.pull.updated) as u64;
                    stats.records_healed += result.push.healed as u64;
                    stats.last_sync_time = Some(Instant::now());
                    stats.last_error = None;
                }
                info!(
                    pushed = result.push.pushed,
                    skipped = result.push.skipped(),
                    healed = result.push.healed,
                    pulled = result.pull.inserted + result.pull.updated,
                    duration_ms = result.duration.as_millis() as u64,
                    "sync cycle completed"
                );
                self.inner.status.publish(SyncStatus::Success);
                self.schedule_reset(generation);
                Ok(CycleOutcome::Completed(result))
            }
            Err(e) => {
                self.finish_with_error(generation, &e);
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> SyncResult<(PushReport, PullReport)> {
        let inner = &self.inner;

        let mut first_error = None;
        let mut push = PushReport::default();
        for binding in inner.registry.iter() {
            match push_collection(
                inner.backend.as_ref(),
                inner.store.as_ref(),
                binding,
                &inner.config,
            )
            .await
            {
                Ok(report) => push.merge(&report),
                Err(e) => {
                    warn!(collection = %binding.collection, error = %e, "push failed, continuing with next collection");
                    first_error.get_or_insert(e);
                }
            }
        }

        let mut pull = PullReport::default();
        for binding in inner.registry.iter() {
            match pull_collection(
                inner.backend.as_ref(),
                inner.store.as_ref(),
                binding,
                &inner.merger,
                inner.config.request_timeout,
            )
            .await
            {
                Ok(report) => pull.merge(&report),
                Err(e) => {
                    warn!(table = %binding.table, error = %e, "pull failed, continuing with next table");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok((push, pull)),
        }
    }

    fn finish_with_error(&self, generation: u64, e: &SyncError) {
        error!(error = %e, "sync cycle failed");
        {
            let mut stats = self.inner.stats.write();
            stats.cycles_failed += 1;
            stats.last_error = Some(e.to_string());
        }
        self.inner.status.publish(SyncStatus::Error);
        self.schedule_reset(generation);
    }

    fn schedule_reset(&self, generation: u64) {
        let status = Arc::clone(&self.inner.status);
        let delay = self.inner.config.status_reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            status.reset_if_current(generation);
        });
    }

    /// Requests a full cycle without waiting for it.
    ///
    /// Errors are logged. Must be called from within a Tokio runtime.
    pub fn push_changes(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.sync().await {
                Ok(outcome) => debug!(?outcome, "background sync finished"),
                Err(e) => warn!(error = %e, "background sync failed"),
            }
        })
    }

    /// Starts applying remote change notifications to the local store.
    ///
    /// Idempotent while the feed is running: the existing handle is returned.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ShutDown`] after shutdown, or the backend's
    /// subscription error.
    pub fn subscribe_realtime(&self) -> SyncResult<RealtimeHandle> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(SyncError::ShutDown);
        }
        let mut slot = self.inner.realtime.lock();
        if let Some(handle) = slot.as_ref().filter(|h| h.is_running() && !h.is_stopped()) {
            return Ok(handle.clone());
        }

        let receiver = self.inner.backend.subscribe()?;
        let handle = spawn_realtime(
            receiver,
            Arc::clone(&self.inner.store),
            self.inner.registry.clone(),
            Arc::clone(&self.inner.merger),
        );
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Stops the realtime task, drops all listeners and rejects further cycles.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.inner.realtime.lock().take() {
            handle.stop();
        }
        self.inner.status.clear();
        info!("sync engine shut down");
    }

    /// Returns true after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}
