//! Bidirectional mapping between local records and remote rows.

use agrosync_store::{fields, timestamp, Record};
use serde_json::{Map, Number, Value};

/// A row as the remote backend stores it, keyed by snake_case column name.
pub type RemoteRow = Map<String, Value>;

/// Translates one entity type between its local and remote shapes.
///
/// Both directions are total: a malformed input still yields a best-effort
/// output. Unknown fields are dropped in either direction.
pub trait EntityMapper: Send + Sync {
    /// Maps a local record to the remote row shape, filling defaults.
    fn to_remote(&self, local: &Record) -> RemoteRow;

    /// Maps a remote row to the local record shape. The result is marked synced.
    fn to_local(&self, remote: &RemoteRow) -> Record;

    /// Local fields that an empty remote value must never overwrite.
    fn preserved_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Local fields holding identifiers of other records.
    fn reference_fields(&self) -> &[&'static str] {
        &[]
    }
}

impl<M: EntityMapper + ?Sized> EntityMapper for &M {
    fn to_remote(&self, local: &Record) -> RemoteRow {
        (**self).to_remote(local)
    }

    fn to_local(&self, remote: &RemoteRow) -> Record {
        (**self).to_local(remote)
    }

    fn preserved_fields(&self) -> &[&'static str] {
        (**self).preserved_fields()
    }

    fn reference_fields(&self) -> &[&'static str] {
        (**self).reference_fields()
    }
}

/// Value type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Any JSON number.
    Number,
    /// Whole number.
    Integer,
    /// Boolean.
    Bool,
    /// ISO-8601 timestamp, normalized to RFC 3339 UTC.
    Timestamp,
    /// Identifier of another record. Blank strings become null.
    Reference,
    /// Structured JSON, passed through unchanged.
    Json,
}

/// Value written by [`EntityMapper::to_remote`] when the local value is
/// absent or cannot be coerced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    /// Leave the column out of the row.
    Omit,
    /// Write `null`.
    Null,
    /// Write the current time.
    Now,
    /// Write a fixed boolean.
    Bool(bool),
    /// Write a fixed integer.
    Integer(i64),
    /// Write a fixed string.
    Text(&'static str),
    /// Write `[]`.
    EmptyArray,
    /// Write `{}`.
    EmptyObject,
}

impl FieldDefault {
    /// Produces the default value, or `None` for [`FieldDefault::Omit`].
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::Omit => None,
            Self::Null => Some(Value::Null),
            Self::Now => Some(Value::String(timestamp::now_rfc3339())),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Integer(i) => Some(Value::from(*i)),
            Self::Text(s) => Some(Value::String((*s).to_string())),
            Self::EmptyArray => Some(Value::Array(Vec::new())),
            Self::EmptyObject => Some(Value::Object(Map::new())),
        }
    }

    /// Returns true if an explicit `null` is an acceptable value.
    #[must_use]
    pub fn allows_null(&self) -> bool {
        matches!(self, Self::Omit | Self::Null)
    }
}

/// One row of an entity's field table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// camelCase local field name.
    pub local: &'static str,
    /// snake_case remote column name.
    pub remote: &'static str,
    /// Value type.
    pub kind: FieldKind,
    /// Fallback used by `to_remote`.
    pub default: FieldDefault,
}

impl FieldSpec {
    /// Creates a field spec.
    #[must_use]
    pub const fn new(
        local: &'static str,
        remote: &'static str,
        kind: FieldKind,
        default: FieldDefault,
    ) -> Self {
        Self {
            local,
            remote,
            kind,
            default,
        }
    }

    /// A text field whose local and remote names match, omitted when absent.
    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self::new(name, name, FieldKind::Text, FieldDefault::Omit)
    }

    /// A reference field, null when absent.
    #[must_use]
    pub const fn reference(local: &'static str, remote: &'static str) -> Self {
        Self::new(local, remote, FieldKind::Reference, FieldDefault::Null)
    }

    /// Returns a copy with a different default.
    #[must_use]
    pub const fn or(self, default: FieldDefault) -> Self {
        Self { default, ..self }
    }
}

/// Fields shared by every entity.
pub static BASE_FIELDS: [FieldSpec; 6] = [
    FieldSpec::new(fields::ID, "id", FieldKind::Reference, FieldDefault::Null),
    FieldSpec::new(fields::CREATED_AT, "created_at", FieldKind::Timestamp, FieldDefault::Now),
    FieldSpec::new(fields::UPDATED_AT, "updated_at", FieldKind::Timestamp, FieldDefault::Now),
    FieldSpec::new(fields::DELETED, "deleted", FieldKind::Bool, FieldDefault::Bool(false)),
    FieldSpec::new(fields::DELETED_AT, "deleted_at", FieldKind::Timestamp, FieldDefault::Null),
    FieldSpec::new(fields::DELETED_BY, "deleted_by", FieldKind::Text, FieldDefault::Null),
];

/// Coerces a value to a field kind. Returns `None` if it cannot be coerced.
///
/// `null` is returned unchanged for every kind.
#[must_use]
pub fn coerce(kind: FieldKind, value: &Value) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    match kind {
        FieldKind::Text => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldKind::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => parse_number(s.trim()),
            _ => None,
        },
        FieldKind::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(Value::from),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                    .map(Value::from)
            }
            _ => None,
        },
        FieldKind::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 0.0 => Some(Value::Bool(false)),
                Some(f) if f == 1.0 => Some(Value::Bool(true)),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::Timestamp => timestamp::normalize(value).map(Value::String),
        FieldKind::Reference => match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(Value::Null)
                } else {
                    Some(Value::String(trimmed.to_string()))
                }
            }
            Value::Number(n) => Some(Value::String(n.to_string())),
            _ => None,
        },
        FieldKind::Json => Some(value.clone()),
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn integral_f64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// A declarative entity mapping: collection, table and field table.
#[derive(Debug)]
pub struct EntityDef {
    /// Local collection name.
    pub collection: &'static str,
    /// Remote table name.
    pub table: &'static str,
    /// Entity-specific fields. [`BASE_FIELDS`] are implied.
    pub fields: &'static [FieldSpec],
    /// Non-regressable local fields.
    pub preserved: &'static [&'static str],
    /// Local fields holding identifiers of other records.
    pub references: &'static [&'static str],
}

impl EntityDef {
    /// Iterates base fields followed by entity fields.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        BASE_FIELDS.iter().chain(self.fields.iter())
    }

    /// Finds a field by local name.
    #[must_use]
    pub fn field_by_local(&self, local: &str) -> Option<&FieldSpec> {
        self.all_fields().find(|f| f.local == local)
    }

    /// Finds a field by remote column name.
    #[must_use]
    pub fn field_by_remote(&self, remote: &str) -> Option<&FieldSpec> {
        self.all_fields().find(|f| f.remote == remote)
    }
}

impl EntityMapper for EntityDef {
    fn to_remote(&self, local: &Record) -> RemoteRow {
        let mut row = RemoteRow::new();
        for spec in self.all_fields() {
            let value = match local.get(spec.local) {
                Some(Value::Null) if !spec.default.allows_null() => spec.default.value(),
                Some(raw) => coerce(spec.kind, raw).or_else(|| spec.default.value()),
                None => spec.default.value(),
            };
            if let Some(value) = value {
                row.insert(spec.remote.to_string(), value);
            }
        }
        row
    }

    fn to_local(&self, remote: &RemoteRow) -> Record {
        let mut record = Record::new();
        for spec in self.all_fields() {
            if let Some(raw) = remote.get(spec.remote) {
                let value = coerce(spec.kind, raw).unwrap_or_else(|| raw.clone());
                record.set(spec.local, value);
            }
        }
        record.set_synced(true);
        record
    }

    fn preserved_fields(&self) -> &[&'static str] {
        self.preserved
    }

    fn reference_fields(&self) -> &[&'static str] {
        self.references
    }
}
