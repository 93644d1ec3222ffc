//! Last-write-wins merge of remote rows into local records.

use agrosync_store::Record;
use serde_json::Value;

/// Result of merging one incoming remote record.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No local copy existed; store the incoming record.
    Insert(Record),
    /// The incoming record is strictly newer; store it.
    Replace {
        /// Record to store.
        record: Record,
        /// Preserved fields carried forward from the local copy.
        preserved_fields: Vec<String>,
    },
    /// The local copy is as new or newer; leave it alone.
    KeepLocal,
}

impl MergeOutcome {
    /// Returns the record to write, if any.
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Insert(record) | Self::Replace { record, .. } => Some(record),
            Self::KeepLocal => None,
        }
    }
}

/// Returns true for absent, `null`, `""`, `[]` and `{}`.
#[must_use]
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Returns true if `incoming` is strictly newer than `local`.
///
/// Ties keep the local copy.
#[must_use]
pub fn remote_wins(local: &Record, incoming: &Record) -> bool {
    incoming.updated_at_millis() > local.updated_at_millis()
}

/// Merges an incoming (already locally-mapped) record against the local copy.
///
/// When the incoming record wins, every field in `preserved` that is empty
/// remotely but populated locally keeps its local value.
#[must_use]
pub fn merge_remote(local: Option<&Record>, incoming: Record, preserved: &[&str]) -> MergeOutcome {
    let Some(local) = local else {
        return MergeOutcome::Insert(incoming);
    };
    if !remote_wins(local, &incoming) {
        return MergeOutcome::KeepLocal;
    }

    let mut record = incoming;
    let mut carried = Vec::new();
    for field in preserved {
        let local_value = local.get(field);
        if is_empty_value(record.get(field)) && !is_empty_value(local_value) {
            if let Some(value) = local_value {
                record.set(field, value.clone());
                carried.push((*field).to_string());
            }
        }
    }
    MergeOutcome::Replace {
        record,
        preserved_fields: carried,
    }
}
