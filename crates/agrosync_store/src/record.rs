//! Record type shared by every synced collection.

use crate::timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Names of the sync fields every record carries.
pub mod fields {
    /// Globally unique identifier, stable across devices.
    pub const ID: &str = "id";
    /// Creation time (ISO-8601).
    pub const CREATED_AT: &str = "createdAt";
    /// Last modification time (ISO-8601), the version used for conflict resolution.
    pub const UPDATED_AT: &str = "updatedAt";
    /// Local-only flag: `true` once the remote acknowledged the current state.
    pub const SYNCED: &str = "synced";
    /// Soft-delete marker.
    pub const DELETED: &str = "deleted";
    /// Soft-delete time.
    pub const DELETED_AT: &str = "deletedAt";
    /// Actor that soft-deleted the record.
    pub const DELETED_BY: &str = "deletedBy";
}

/// A locally stored record: a JSON object keyed by camelCase field names.
///
/// Domain fields are opaque to the store. Only the fields in [`fields`] have
/// meaning here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record with the given id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.set(fields::ID, id.into());
        record
    }

    /// Wraps a JSON value if it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns the record id, if present as a non-empty string.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0
            .get(fields::ID)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a field as a string slice.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.to_string(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns true if the field is present (even if null).
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns true if the remote has acknowledged the current state.
    ///
    /// A missing or non-boolean `synced` field counts as unsynced.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self.0.get(fields::SYNCED), Some(Value::Bool(true)))
    }

    /// Sets the `synced` flag.
    pub fn set_synced(&mut self, synced: bool) {
        self.set(fields::SYNCED, synced);
    }

    /// Returns true if the record is a tombstone.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.0.get(fields::DELETED), Some(Value::Bool(true)))
    }

    /// Returns the record version in epoch milliseconds.
    ///
    /// Uses `updatedAt`, then `createdAt`, then `0`.
    #[must_use]
    pub fn updated_at_millis(&self) -> i64 {
        self.0
            .get(fields::UPDATED_AT)
            .and_then(timestamp::parse_millis)
            .or_else(|| self.0.get(fields::CREATED_AT).and_then(timestamp::parse_millis))
            .unwrap_or(0)
    }

    /// Records a local edit: bumps `updatedAt` and clears `synced`.
    ///
    /// The new `updatedAt` is never earlier than the previous one, so a local
    /// edit always wins against the copy it was derived from.
    pub fn touch(&mut self) {
        let previous = self
            .0
            .get(fields::UPDATED_AT)
            .and_then(timestamp::parse_millis);
        let now = timestamp::now_millis();
        let next = match previous {
            Some(prev) if prev >= now => prev + 1,
            _ => now,
        };
        if let Some(formatted) = timestamp::format_millis(next) {
            self.set(fields::UPDATED_AT, formatted);
        }
        if !self.contains(fields::CREATED_AT) {
            if let Some(created) = self.get(fields::UPDATED_AT).cloned() {
                self.0.insert(fields::CREATED_AT.to_string(), created);
            }
        }
        self.set_synced(false);
    }

    /// Soft-deletes the record as a local edit.
    pub fn mark_deleted(&mut self, deleted_by: Option<&str>) {
        self.touch();
        let at = self.get(fields::UPDATED_AT).cloned().unwrap_or(Value::Null);
        self.set(fields::DELETED, true);
        self.set(fields::DELETED_AT, at);
        self.set(
            fields::DELETED_BY,
            deleted_by.map_or(Value::Null, |by| Value::String(by.to_string())),
        );
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record and returns the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_requires_non_empty_string() {
        assert_eq!(Record::with_id("a").id(), Some("a"));
        assert_eq!(Record::with_id("").id(), None);
        assert_eq!(Record::new().with("id", 7).id(), None);
    }

    #[test]
    fn synced_defaults_to_false() {
        let mut record = Record::with_id("a");
        assert!(!record.is_synced());
        record.set("synced", "yes");
        assert!(!record.is_synced());
        record.set_synced(true);
        assert!(record.is_synced());
    }

    #[test]
    fn version_falls_back_to_created_at() {
        let record = Record::with_id("a").with("createdAt", "2024-01-01T00:00:00Z");
        assert_eq!(record.updated_at_millis(), 1_704_067_200_000);

        let record = record.with("updatedAt", "2024-01-02T00:00:00Z");
        assert_eq!(record.updated_at_millis(), 1_704_153_600_000);

        let record = Record::with_id("a").with("updatedAt", "garbage");
        assert_eq!(record.updated_at_millis(), 0);
    }

    #[test]
    fn touch_moves_forward_and_clears_synced() {
        let mut record = Record::with_id("a")
            .with("updatedAt", "2999-01-01T00:00:00.000Z")
            .with("synced", true);
        let before = record.updated_at_millis();

        record.touch();

        assert_eq!(record.updated_at_millis(), before + 1);
        assert!(!record.is_synced());
        assert!(record.contains("createdAt"));
    }

    #[test]
    fn mark_deleted_sets_tombstone_fields() {
        let mut record = Record::with_id("a").with("synced", true);
        record.mark_deleted(Some("user-1"));

        assert!(record.is_deleted());
        assert!(!record.is_synced());
        assert_eq!(record.get("deletedBy"), Some(&json!("user-1")));
        assert_eq!(record.get("deletedAt"), record.get("updatedAt"));
    }

    #[test]
    fn serializes_as_plain_object() {
        let record = Record::with_id("a").with("name", "North");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "a", "name": "North"}));

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
