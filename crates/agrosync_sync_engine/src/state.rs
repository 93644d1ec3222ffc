//! Sync status, statistics and status listeners.

use crate::pull::PullReport;
use crate::push::PushReport;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// The published status of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No cycle running.
    #[default]
    Idle,
    /// A cycle is running.
    Syncing,
    /// The last cycle completed.
    Success,
    /// The last cycle failed.
    Error,
}

impl SyncStatus {
    /// Returns true if a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    /// Returns true if this status reverts to idle on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Error)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        })
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that completed push and pull.
    pub cycles_completed: u64,
    /// Cycles that ended in error.
    pub cycles_failed: u64,
    /// Invocations dropped because a cycle was already running.
    pub cycles_skipped: u64,
    /// Records pushed and marked synced.
    pub records_pushed: u64,
    /// Records inserted or replaced by pulls.
    pub records_pulled: u64,
    /// Records deleted by self-healing.
    pub records_healed: u64,
    /// Completion time of the last successful cycle.
    pub last_sync_time: Option<Instant>,
    /// Message of the last cycle error.
    pub last_error: Option<String>,
}

/// Result of a completed sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncCycleResult {
    /// Push counters over all collections.
    pub push: PushReport,
    /// Pull counters over all collections.
    pub pull: PullReport,
    /// Duration of the sync cycle.
    pub duration: Duration,
}

/// How a call to `sync()` ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Push and pull ran for every collection.
    Completed(SyncCycleResult),
    /// Another cycle was already running.
    Skipped,
    /// No active session; nothing was touched.
    NoSession,
}

type Listener = Arc<dyn Fn(SyncStatus) + Send + Sync>;

/// Holds the current status and fans changes out to listeners.
///
/// Status changes and their notifications are serialized, so listeners
/// observe changes in the order they were made.
pub(crate) struct StatusBroadcaster {
    status: RwLock<SyncStatus>,
    ordering: Mutex<()>,
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    generation: AtomicU64,
}

impl StatusBroadcaster {
    pub(crate) fn new() -> Self {
        Self {
            status: RwLock::new(SyncStatus::Idle),
            ordering: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn status(&self) -> SyncStatus {
        *self.status.read()
    }

    /// Starts a new cycle generation and returns it.
    pub(crate) fn begin_cycle(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sets the status and notifies listeners.
    pub(crate) fn publish(&self, status: SyncStatus) {
        let _ordering = self.ordering.lock();
        *self.status.write() = status;
        self.notify(status);
    }

    fn notify(&self, status: SyncStatus) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(status);
        }
    }

    /// Reverts a terminal status to idle unless a newer cycle has started.
    pub(crate) fn reset_if_current(&self, generation: u64) -> bool {
        let _ordering = self.ordering.lock();
        {
            let mut status = self.status.write();
            if self.generation.load(Ordering::SeqCst) != generation || !status.is_terminal() {
                return false;
            }
            *status = SyncStatus::Idle;
        }
        self.notify(SyncStatus::Idle);
        true
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> u64 {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub(crate) fn clear(&self) {
        self.listeners.write().clear();
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// Registration returned by `on_status_change`.
///
/// Dropping the subscription does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct StatusSubscription {
    id: u64,
    broadcaster: Weak<StatusBroadcaster>,
}

impl StatusSubscription {
    pub(crate) fn new(id: u64, broadcaster: &Arc<StatusBroadcaster>) -> Self {
        Self {
            id,
            broadcaster: Arc::downgrade(broadcaster),
        }
    }

    /// Removes the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.broadcaster
            .upgrade()
            .is_some_and(|b| b.unsubscribe(self.id))
    }
}

impl fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("status", &self.status())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_helpers() {
        assert!(SyncStatus::Syncing.is_active());
        assert!(!SyncStatus::Idle.is_active());
        assert!(SyncStatus::Success.is_terminal());
        assert!(SyncStatus::Error.is_terminal());
        assert_eq!(SyncStatus::default(), SyncStatus::Idle);
        assert_eq!(SyncStatus::Error.to_string(), "error");
    }

    #[test]
    fn listeners_receive_updates_until_unsubscribed() {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = broadcaster.subscribe(Arc::new(move |s: SyncStatus| sink.lock().push(s)));
        let subscription = StatusSubscription::new(id, &broadcaster);

        broadcaster.publish(SyncStatus::Syncing);
        broadcaster.publish(SyncStatus::Success);
        assert!(subscription.unsubscribe());
        broadcaster.publish(SyncStatus::Idle);

        assert_eq!(*seen.lock(), vec![SyncStatus::Syncing, SyncStatus::Success]);
        assert_eq!(broadcaster.status(), SyncStatus::Idle);
    }

    #[test]
    fn last_notification_matches_final_status() {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        let last = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last);
        broadcaster.subscribe(Arc::new(move |s: SyncStatus| *sink.lock() = Some(s)));

        let threads: Vec<_> = [
            SyncStatus::Syncing,
            SyncStatus::Success,
            SyncStatus::Error,
            SyncStatus::Idle,
        ]
        .into_iter()
        .map(|status| {
            let broadcaster = Arc::clone(&broadcaster);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    broadcaster.publish(status);
                }
            })
        })
        .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(*last.lock(), Some(broadcaster.status()));
    }

    #[test]
    fn stale_generation_does_not_reset() {
        let broadcaster = StatusBroadcaster::new();
        let first = broadcaster.begin_cycle();
        broadcaster.publish(SyncStatus::Success);
        let second = broadcaster.begin_cycle();
        broadcaster.publish(SyncStatus::Error);

        assert!(!broadcaster.reset_if_current(first));
        assert_eq!(broadcaster.status(), SyncStatus::Error);
        assert!(broadcaster.reset_if_current(second));
        assert_eq!(broadcaster.status(), SyncStatus::Idle);
    }

    #[test]
    fn reset_ignores_non_terminal_status() {
        let broadcaster = StatusBroadcaster::new();
        let generation = broadcaster.begin_cycle();
        broadcaster.publish(SyncStatus::Syncing);
        assert!(!broadcaster.reset_if_current(generation));
    }

    #[test]
    fn unsubscribe_after_broadcaster_dropped() {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        let id = broadcaster.subscribe(Arc::new(|_: SyncStatus| {}));
        let subscription = StatusSubscription::new(id, &broadcaster);
        drop(broadcaster);
        assert!(!subscription.unsubscribe());
    }
}
