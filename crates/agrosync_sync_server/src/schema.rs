//! Table schemas derived from entity field tables.

use agrosync_store::timestamp;
use agrosync_sync_protocol::{EntityDef, FieldKind, RemoteError, RemoteRow};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// A column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `uuid`
    Uuid,
    /// `text`
    Text,
    /// `numeric`
    Numeric,
    /// `integer`
    Integer,
    /// `boolean`
    Boolean,
    /// `timestamptz`
    Timestamptz,
    /// `jsonb`
    Jsonb,
}

impl ColumnType {
    fn from_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => ColumnType::Text,
            FieldKind::Number => ColumnType::Numeric,
            FieldKind::Integer => ColumnType::Integer,
            FieldKind::Bool => ColumnType::Boolean,
            FieldKind::Timestamp => ColumnType::Timestamptz,
            FieldKind::Reference => ColumnType::Uuid,
            FieldKind::Json => ColumnType::Jsonb,
        }
    }

    /// Name used in `invalid input syntax` messages.
    fn syntax_name(&self) -> &'static str {
        match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
            ColumnType::Numeric => "numeric",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamptz => "timestamp with time zone",
            ColumnType::Jsonb => "json",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (ColumnType::Jsonb, _) => true,
            (ColumnType::Uuid, Value::String(s)) => Uuid::try_parse(s).is_ok(),
            (ColumnType::Text, Value::String(_)) => true,
            (ColumnType::Numeric, Value::Number(_)) => true,
            (ColumnType::Numeric, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (ColumnType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ColumnType::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Timestamptz, Value::String(s)) => timestamp::parse_str_millis(s).is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
            ColumnType::Numeric => "numeric",
            ColumnType::Integer => "integer",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamptz => "timestamptz",
            ColumnType::Jsonb => "jsonb",
        })
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Column type.
    pub ty: ColumnType,
    /// Whether `null` is accepted.
    pub nullable: bool,
}

const NOT_NULL: [&str; 3] = ["id", "created_at", "updated_at"];

/// Columns of one table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: &'static str,
    columns: Vec<Column>,
}

impl TableSchema {
    /// Derives a schema from an entity's field table.
    ///
    /// `id` is the uuid primary key; `created_at` and `updated_at` are not null.
    pub fn from_entity(entity: &EntityDef) -> Self {
        let columns = entity
            .all_fields()
            .map(|spec| Column {
                name: spec.remote,
                ty: ColumnType::from_kind(spec.kind),
                nullable: !NOT_NULL.contains(&spec.remote),
            })
            .collect();
        Self {
            name: entity.table,
            columns,
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Finds a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks a row against the schema.
    ///
    /// Errors carry the codes PostgREST would return: `PGRST204` for an
    /// unknown column, `23502` for a null in a not-null column and `22P02`
    /// (`22007` for timestamps) for a value of the wrong type.
    pub fn validate(&self, row: &RemoteRow) -> Result<(), RemoteError> {
        for (key, value) in row {
            let Some(column) = self.column(key) else {
                return Err(RemoteError::with_code(
                    "PGRST204",
                    format!(
                        "Could not find the '{key}' column of '{}' in the schema cache",
                        self.name
                    ),
                )
                .status(400));
            };
            if value.is_null() && !column.nullable {
                return Err(not_null(column.name, self.name));
            }
            if !column.ty.accepts(value) {
                let code = if column.ty == ColumnType::Timestamptz {
                    "22007"
                } else {
                    "22P02"
                };
                return Err(RemoteError::with_code(
                    code,
                    format!(
                        "invalid input syntax for type {}: {}",
                        column.ty.syntax_name(),
                        display_value(value)
                    ),
                )
                .status(400));
            }
        }
        if !row.contains_key("id") {
            return Err(not_null("id", self.name));
        }
        Ok(())
    }
}

fn not_null(column: &str, table: &str) -> RemoteError {
    RemoteError::with_code(
        "23502",
        format!("null value in column \"{column}\" of relation \"{table}\" violates not-null constraint"),
    )
    .status(400)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => format!("\"{other}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrosync_sync_protocol::entities::{ACTIVITY_LOGS, LOTS};
    use serde_json::json;

    const ID: &str = "7d9c1f52-6c3e-4b1a-8f0e-2a4b6c8d0e1f";

    fn row(value: Value) -> RemoteRow {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn derives_column_types() {
        let schema = TableSchema::from_entity(&LOTS);
        assert_eq!(schema.name(), "lots");
        assert_eq!(schema.column("id").map(|c| c.ty), Some(ColumnType::Uuid));
        assert_eq!(schema.column("farm_id").map(|c| c.ty), Some(ColumnType::Uuid));
        assert_eq!(
            schema.column("updated_at").map(|c| (c.ty, c.nullable)),
            Some((ColumnType::Timestamptz, false))
        );
        assert!(schema.column("deleted_at").is_some_and(|c| c.nullable));
        assert!(schema.column("farmId").is_none());
    }

    #[test]
    fn accepts_valid_row() {
        let schema = TableSchema::from_entity(&LOTS);
        let valid = row(json!({
            "id": ID,
            "farm_id": null,
            "updated_at": "2024-01-01T00:00:00Z",
            "deleted": false
        }));
        assert_eq!(schema.validate(&valid), Ok(()));
    }

    #[test]
    fn unknown_column_is_schema_cache_error() {
        let schema = TableSchema::from_entity(&LOTS);
        let err = schema.validate(&row(json!({"id": ID, "soil_ph": 6.5}))).unwrap_err();
        assert_eq!(err.code.as_deref(), Some("PGRST204"));
        assert!(err.message.contains("'soil_ph' column of 'lots'"));
    }

    #[test]
    fn malformed_uuid_is_invalid_syntax() {
        let schema = TableSchema::from_entity(&LOTS);
        let err = schema
            .validate(&row(json!({"id": ID, "farm_id": "farm-1"})))
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("22P02"));
        assert_eq!(err.message, "invalid input syntax for type uuid: \"farm-1\"");
    }

    #[test]
    fn null_in_not_null_column() {
        let schema = TableSchema::from_entity(&LOTS);
        let err = schema
            .validate(&row(json!({"id": ID, "updated_at": null})))
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("23502"));

        let err = schema.validate(&row(json!({"name": "x"}))).unwrap_err();
        assert_eq!(err.code.as_deref(), Some("23502"));
    }

    #[test]
    fn bad_timestamp_and_text_user_id() {
        let schema = TableSchema::from_entity(&ACTIVITY_LOGS);
        assert_eq!(schema.column("user_id").map(|c| c.ty), Some(ColumnType::Text));
        let err = schema
            .validate(&row(json!({"id": ID, "created_at": "yesterday"})))
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("22007"));
    }
}
