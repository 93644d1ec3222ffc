//! Push engine: uploads unsynced local records.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::registry::CollectionBinding;
use crate::transport::RemoteBackend;
use agrosync_store::LocalStore;
use agrosync_sync_protocol::{invalid_reference_fields, RejectionKind, RemoteError};
use tracing::{debug, info, warn};

/// Outcome of pushing one or more collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Unsynced records found.
    pub attempted: usize,
    /// Records upserted and marked synced.
    pub pushed: usize,
    /// Records skipped after a schema mismatch.
    pub skipped_schema: usize,
    /// Records skipped after any other failure.
    pub skipped_other: usize,
    /// Records deleted locally because of malformed identifiers.
    pub healed: usize,
    /// Records whose local acknowledgement or deletion failed.
    pub store_failures: usize,
}

impl PushReport {
    /// Adds another report's counters to this one.
    pub fn merge(&mut self, other: &PushReport) {
        self.attempted += other.attempted;
        self.pushed += other.pushed;
        self.skipped_schema += other.skipped_schema;
        self.skipped_other += other.skipped_other;
        self.healed += other.healed;
        self.store_failures += other.store_failures;
    }

    /// Returns the number of records left unsynced for the next cycle.
    pub fn skipped(&self) -> usize {
        self.skipped_schema + self.skipped_other + self.store_failures
    }
}

/// Pushes every unsynced record of one collection.
///
/// Each record is an independent upsert. A rejected record is logged and
/// skipped, or deleted locally when the rejection is an invalid reference and
/// one of its identifiers fails the configured validator. When nothing is
/// unsynced, no remote call is made.
///
/// A local store failure while acknowledging or deleting one record is
/// logged and counted; the record stays unsynced for the next cycle.
///
/// # Errors
///
/// Only a failure to list the unsynced records is returned.
pub async fn push_collection<B, S>(
    backend: &B,
    store: &S,
    binding: &CollectionBinding,
    config: &SyncConfig,
) -> SyncResult<PushReport>
where
    B: RemoteBackend + ?Sized,
    S: LocalStore + ?Sized,
{
    let mut report = PushReport::default();
    let pending = store.list_unsynced(&binding.collection)?;
    if pending.is_empty() {
        return Ok(report);
    }
    debug!(collection = %binding.collection, count = pending.len(), "pushing unsynced records");

    for record in pending {
        report.attempted += 1;
        let Some(id) = record.id().map(str::to_string) else {
            warn!(collection = %binding.collection, "skipping unsynced record without id");
            report.skipped_other += 1;
            continue;
        };

        let row = binding.mapper.to_remote(&record);
        let result = match tokio::time::timeout(
            config.request_timeout,
            backend.upsert(&binding.table, row),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteError::new("upsert timed out")),
        };

        let error = match result {
            Ok(()) => {
                match store.mark_synced(&binding.collection, &id) {
                    Ok(()) => report.pushed += 1,
                    Err(e) => {
                        warn!(
                            collection = %binding.collection,
                            id = %id,
                            error = %e,
                            "upserted record could not be marked synced"
                        );
                        report.store_failures += 1;
                    }
                }
                continue;
            }
            Err(error) => error,
        };

        match config.classifier.classify(&error) {
            RejectionKind::SchemaMismatch => {
                warn!(
                    collection = %binding.collection,
                    id = %id,
                    error = %error,
                    "remote schema rejected record, skipping"
                );
                report.skipped_schema += 1;
            }
            RejectionKind::InvalidReference => {
                let invalid = invalid_reference_fields(
                    &record,
                    binding.mapper.as_ref(),
                    config.reference_validator.as_ref(),
                );
                if invalid.is_empty() {
                    warn!(
                        collection = %binding.collection,
                        id = %id,
                        error = %error,
                        "invalid reference reported but all identifiers validate, will retry"
                    );
                    report.skipped_other += 1;
                } else {
                    info!(
                        collection = %binding.collection,
                        id = %id,
                        fields = ?invalid,
                        "deleting local record with malformed identifiers"
                    );
                    match store.delete(&binding.collection, &id) {
                        Ok(_) => report.healed += 1,
                        Err(e) => {
                            warn!(
                                collection = %binding.collection,
                                id = %id,
                                error = %e,
                                "failed to delete record with malformed identifiers"
                            );
                            report.store_failures += 1;
                        }
                    }
                }
            }
            RejectionKind::Other => {
                warn!(
                    collection = %binding.collection,
                    id = %id,
                    error = %error,
                    "push failed, will retry next cycle"
                );
                report.skipped_other += 1;
            }
        }
    }

    Ok(report)
}
