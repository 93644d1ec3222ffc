//! Realtime merge handler: applies remote change notifications as they arrive.

use crate::error::SyncResult;
use crate::pull::{RemoteMerger, RowMerge};
use crate::registry::MapperRegistry;
use agrosync_store::LocalStore;
use agrosync_sync_protocol::{ChangeEvent, ChangeType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// What a single change event did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// An insert or update was merged.
    Merged(RowMerge),
    /// A delete removed the local record (`true`) or found nothing (`false`).
    Deleted(bool),
    /// The event was for an unknown table or carried no usable row.
    Ignored,
}

/// Applies one change event under the same rule as a pull.
///
/// Events for tables with no registered mapper are ignored. A `DELETE`
/// removes the local record matching `old.id`.
pub fn apply_change_event<S: LocalStore + ?Sized>(
    store: &S,
    registry: &MapperRegistry,
    merger: &RemoteMerger,
    event: &ChangeEvent,
) -> SyncResult<EventOutcome> {
    let Some(binding) = registry.by_table(&event.table) else {
        debug!(table = %event.table, "ignoring change for unregistered table");
        return Ok(EventOutcome::Ignored);
    };

    match event.event_type {
        ChangeType::Delete => match event.old_id() {
            Some(id) => {
                let removed = store.delete(&binding.collection, id)?;
                debug!(collection = %binding.collection, id = %id, removed, "applied remote delete");
                Ok(EventOutcome::Deleted(removed))
            }
            None => {
                warn!(table = %event.table, "delete event without old id");
                Ok(EventOutcome::Ignored)
            }
        },
        ChangeType::Insert | ChangeType::Update => match &event.new {
            Some(row) => Ok(EventOutcome::Merged(merger.merge_row(store, binding, row)?)),
            None => {
                warn!(table = %event.table, event = ?event.event_type, "change event without new row");
                Ok(EventOutcome::Ignored)
            }
        },
    }
}

/// Handle to a running realtime task.
///
/// Clones share the task. Dropping every clone stops it.
#[derive(Debug, Clone)]
pub struct RealtimeHandle {
    stop: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
}

impl RealtimeHandle {
    /// Asks the task to stop. It exits after the event it is processing.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Returns true until the task has exited.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Spawns a task that applies every event from `receiver` to `store`.
///
/// A lagged receiver logs the skipped count and keeps going; the next pull
/// reconciles whatever was missed. A closed channel ends the task. Must be
/// called from within a Tokio runtime.
pub fn spawn_realtime<S>(
    mut receiver: broadcast::Receiver<ChangeEvent>,
    store: Arc<S>,
    registry: MapperRegistry,
    merger: Arc<RemoteMerger>,
) -> RealtimeHandle
where
    S: LocalStore + ?Sized + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let running = Arc::new(AtomicBool::new(true));
    let flag = RunningFlag(Arc::clone(&running));

    tokio::spawn(async move {
        let _flag = flag;
        info!("realtime merge handler started");
        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                received = receiver.recv() => match received {
                    Ok(event) => {
                        if let Err(e) = apply_change_event(store.as_ref(), &registry, &merger, &event) {
                            warn!(table = %event.table, error = %e, "failed to apply change event");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "realtime receiver lagged, next pull will reconcile");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("realtime feed closed");
                        break;
                    }
                },
            }
        }
        info!("realtime merge handler stopped");
    });

    RealtimeHandle {
        stop: Arc::new(stop_tx),
        running,
    }
}
