//! Realtime change notifications from the remote backend.

use crate::mapper::RemoteRow;
use agrosync_store::fields;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// Row was inserted.
    Insert,
    /// Row was updated.
    Update,
    /// Row was deleted.
    Delete,
}

/// A single row change pushed by the remote backend.
///
/// Wire shape: `{"table": "...", "eventType": "INSERT", "new": {...}, "old": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Remote table name.
    pub table: String,
    /// Type of change.
    #[serde(rename = "eventType")]
    pub event_type: ChangeType,
    /// Row after the change (insert/update).
    #[serde(default)]
    pub new: Option<RemoteRow>,
    /// Row before the change. For deletes, at least the primary key.
    #[serde(default)]
    pub old: Option<RemoteRow>,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(table: impl Into<String>, row: RemoteRow) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeType::Insert,
            new: Some(row),
            old: None,
        }
    }

    /// Creates an update event.
    pub fn update(table: impl Into<String>, row: RemoteRow, old: Option<RemoteRow>) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeType::Update,
            new: Some(row),
            old,
        }
    }

    /// Creates a delete event.
    pub fn delete(table: impl Into<String>, old: RemoteRow) -> Self {
        Self {
            table: table.into(),
            event_type: ChangeType::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Returns the id of the row before the change.
    #[must_use]
    pub fn old_id(&self) -> Option<&str> {
        row_id(self.old.as_ref())
    }

    /// Returns the id of the row after the change.
    #[must_use]
    pub fn new_id(&self) -> Option<&str> {
        row_id(self.new.as_ref())
    }
}

fn row_id(row: Option<&RemoteRow>) -> Option<&str> {
    row.and_then(|r| r.get(fields::ID))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_shape() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "table": "lots",
            "eventType": "UPDATE",
            "new": {"id": "l1", "name": "Lot"},
            "old": {"id": "l1"}
        }))
        .unwrap();

        assert_eq!(event.event_type, ChangeType::Update);
        assert_eq!(event.new_id(), Some("l1"));
        assert_eq!(event.old_id(), Some("l1"));
    }

    #[test]
    fn delete_with_empty_new() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "table": "lots",
            "eventType": "DELETE",
            "new": {},
            "old": {"id": "l1"}
        }))
        .unwrap();

        assert_eq!(event.event_type, ChangeType::Delete);
        assert_eq!(event.new_id(), None);
        assert_eq!(event.old_id(), Some("l1"));
    }

    #[test]
    fn serializes_upper_case() {
        let mut old = RemoteRow::new();
        old.insert("id".into(), json!("x"));
        let value = serde_json::to_value(ChangeEvent::delete("farms", old)).unwrap();
        assert_eq!(value["eventType"], json!("DELETE"));
        assert_eq!(value["new"], Value::Null);
    }
}
