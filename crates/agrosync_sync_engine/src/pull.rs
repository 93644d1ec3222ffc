//! Pull engine: merges remote snapshots into the local store.

use crate::error::{SyncError, SyncResult};
use crate::registry::CollectionBinding;
use crate::transport::RemoteBackend;
use agrosync_store::LocalStore;
use agrosync_sync_protocol::{merge_remote, MergeOutcome, RemoteRow};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of pulling one or more collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Remote rows received.
    pub fetched: usize,
    /// Rows inserted locally.
    pub inserted: usize,
    /// Local records replaced by a newer remote copy.
    pub updated: usize,
    /// Rows discarded because the local copy was as new or newer.
    pub unchanged: usize,
    /// Rows skipped for lacking an id.
    pub skipped: usize,
    /// Non-regressable field values carried forward from the local copy.
    pub preserved_fields: usize,
    /// Rows whose local read or write failed.
    pub store_failures: usize,
}

impl PullReport {
    /// Adds another report's counters to this one.
    pub fn merge(&mut self, other: &PullReport) {
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.preserved_fields += other.preserved_fields;
        self.store_failures += other.store_failures;
    }

    fn record(&mut self, merge: &RowMerge) {
        match merge {
            RowMerge::Inserted => self.inserted += 1,
            RowMerge::Updated { preserved } => {
                self.updated += 1;
                self.preserved_fields += preserved;
            }
            RowMerge::Unchanged => self.unchanged += 1,
            RowMerge::Skipped => self.skipped += 1,
        }
    }
}

/// What happened to one remote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMerge {
    /// No local copy existed.
    Inserted,
    /// The remote copy was newer and replaced the local one.
    Updated {
        /// Number of preserved fields carried forward.
        preserved: usize,
    },
    /// The local copy was as new or newer.
    Unchanged,
    /// The row had no usable id.
    Skipped,
}

/// Applies remote rows to a store under last-write-wins.
///
/// The pull engine and the realtime handler share one merger so their
/// read-compare-write sequences never interleave on the same store.
#[derive(Debug, Default)]
pub struct RemoteMerger {
    lock: Mutex<()>,
}

impl RemoteMerger {
    /// Creates a merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a remote row to the local shape and merges it into the store.
    pub fn merge_row<S: LocalStore + ?Sized>(
        &self,
        store: &S,
        binding: &CollectionBinding,
        row: &RemoteRow,
    ) -> SyncResult<RowMerge> {
        let incoming = binding.mapper.to_local(row);
        let Some(id) = incoming.id().map(str::to_string) else {
            warn!(table = %binding.table, "skipping remote row without id");
            return Ok(RowMerge::Skipped);
        };

        let _guard = self.lock.lock();
        let local = store.get(&binding.collection, &id)?;
        match merge_remote(local.as_ref(), incoming, binding.mapper.preserved_fields()) {
            MergeOutcome::Insert(record) => {
                store.put(&binding.collection, record)?;
                Ok(RowMerge::Inserted)
            }
            MergeOutcome::Replace {
                record,
                preserved_fields,
            } => {
                if !preserved_fields.is_empty() {
                    debug!(
                        collection = %binding.collection,
                        id = %id,
                        fields = ?preserved_fields,
                        "kept local values for empty remote fields"
                    );
                }
                store.put(&binding.collection, record)?;
                Ok(RowMerge::Updated {
                    preserved: preserved_fields.len(),
                })
            }
            MergeOutcome::KeepLocal => Ok(RowMerge::Unchanged),
        }
    }
}

/// Pulls the full remote snapshot of one collection and merges it.
///
/// Local records missing from the snapshot are left alone. A store failure
/// on one row is logged and counted; the next pull retries it.
///
/// # Errors
///
/// Returns the `select_all` failure ([`SyncError::Timeout`] if it exceeds
/// `request_timeout`).
pub async fn pull_collection<B, S>(
    backend: &B,
    store: &S,
    binding: &CollectionBinding,
    merger: &RemoteMerger,
    request_timeout: Duration,
) -> SyncResult<PullReport>
where
    B: RemoteBackend + ?Sized,
    S: LocalStore + ?Sized,
{
    let rows = tokio::time::timeout(request_timeout, backend.select_all(&binding.table))
        .await
        .map_err(|_| SyncError::Timeout)??;

    let mut report = PullReport {
        fetched: rows.len(),
        ..PullReport::default()
    };
    for row in &rows {
        match merger.merge_row(store, binding, row) {
            Ok(merge) => report.record(&merge),
            Err(e) => {
                warn!(
                    collection = %binding.collection,
                    id = row.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
                    error = %e,
                    "failed to merge remote row"
                );
                report.store_failures += 1;
            }
        }
    }
    debug!(
        collection = %binding.collection,
        fetched = report.fetched,
        inserted = report.inserted,
        updated = report.updated,
        "pulled collection"
    );
    Ok(report)
}
