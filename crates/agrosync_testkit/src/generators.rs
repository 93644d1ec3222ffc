//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records, remote rows and field
//! values, including the malformed shapes peers actually send.

use agrosync_store::{fields, timestamp, Record};
use agrosync_sync_protocol::{EntityDef, FieldKind, RemoteRow};
use proptest::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

/// 2020-01-01T00:00:00Z
pub const MIN_MILLIS: i64 = 1_577_836_800_000;
/// 2030-01-01T00:00:00Z
pub const MAX_MILLIS: i64 = 1_893_456_000_000;

/// Strategy for epoch milliseconds within a plausible range.
pub fn millis_strategy() -> impl Strategy<Value = i64> {
    MIN_MILLIS..MAX_MILLIS
}

/// Strategy for RFC 3339 timestamps.
pub fn iso_timestamp_strategy() -> impl Strategy<Value = String> {
    millis_strategy().prop_map(|m| timestamp::format_millis(m).unwrap_or_default())
}

/// Strategy for well-formed uuid strings.
pub fn uuid_strategy() -> impl Strategy<Value = String> {
    any::<u128>().prop_map(|bits| Uuid::from_u128(bits).to_string())
}

/// Strategy for identifiers the remote rejects as uuids.
pub fn malformed_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z]{3,8}-[0-9]{1,4}").expect("Invalid regex"),
        prop::string::string_regex("[0-9]{1,12}").expect("Invalid regex"),
        // Right length, wrong alphabet.
        prop::string::string_regex("[g-z]{8}-[g-z]{4}-[g-z]{4}-[g-z]{4}-[g-z]{12}")
            .expect("Invalid regex"),
    ]
}

/// Strategy for values that count as empty for non-regressable fields.
pub fn empty_value_strategy() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(Value::Null)),
        Just(Some(json!(""))),
        Just(Some(json!([]))),
        Just(Some(json!({}))),
    ]
}

/// Strategy for non-empty GeoJSON polygon boundaries.
pub fn boundary_strategy() -> impl Strategy<Value = Value> {
    (-90.0f64..90.0, -180.0f64..180.0, 0.001f64..1.0).prop_map(|(lat, lng, size)| {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [lng, lat],
                [lng + size, lat],
                [lng + size, lat + size],
                [lng, lat + size],
                [lng, lat]
            ]]
        })
    })
}

/// Strategy for arbitrary JSON scalars, including ones no field expects.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(Value::from),
        ".{0,16}".prop_map(Value::String),
        iso_timestamp_strategy().prop_map(Value::String),
    ]
}

/// Strategy for arbitrary JSON values up to a small depth.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn value_for_kind(kind: FieldKind) -> BoxedStrategy<Value> {
    match kind {
        FieldKind::Text => ".{0,24}".prop_map(Value::String).boxed(),
        FieldKind::Number => (-1.0e6f64..1.0e6).prop_map(Value::from).boxed(),
        FieldKind::Integer => any::<i32>().prop_map(Value::from).boxed(),
        FieldKind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        FieldKind::Timestamp => iso_timestamp_strategy().prop_map(Value::String).boxed(),
        FieldKind::Reference => uuid_strategy().prop_map(Value::String).boxed(),
        FieldKind::Json => json_value_strategy().boxed(),
    }
}

/// Strategy for well-typed local records of `entity`, each field optional.
pub fn local_record_strategy(entity: &'static EntityDef) -> impl Strategy<Value = Record> {
    let specs: Vec<_> = entity
        .fields
        .iter()
        .map(|spec| (Just(spec.local), prop::option::of(value_for_kind(spec.kind))))
        .collect();
    (uuid_strategy(), millis_strategy(), any::<bool>(), specs).prop_map(
        |(id, millis, synced, values)| {
            let stamp = timestamp::format_millis(millis).unwrap_or_default();
            let mut record = Record::with_id(id)
                .with(fields::CREATED_AT, stamp.clone())
                .with(fields::UPDATED_AT, stamp)
                .with(fields::SYNCED, synced);
            for (name, value) in values {
                if let Some(value) = value {
                    record.set(name, value);
                }
            }
            record
        },
    )
}

/// Strategy for remote rows of `entity` with arbitrary, often ill-typed values.
pub fn remote_row_strategy(entity: &'static EntityDef) -> impl Strategy<Value = RemoteRow> {
    let columns: Vec<_> = entity
        .all_fields()
        .map(|spec| (Just(spec.remote), prop::option::of(json_value_strategy())))
        .collect();
    columns.prop_map(|values| {
        values
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect()
    })
}

/// Strategy for two versions of the same record with independent timestamps.
///
/// Both carry id `r1` and a `name` telling them apart.
pub fn version_pair_strategy() -> impl Strategy<Value = (Record, Record)> {
    (millis_strategy(), millis_strategy()).prop_map(|(t1, t2)| (version(t1, "a"), version(t2, "b")))
}

fn version(millis: i64, name: &str) -> Record {
    Record::with_id("r1")
        .with(fields::UPDATED_AT, timestamp::format_millis(millis).unwrap_or_default())
        .with("name", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrosync_sync_protocol::entities::FARMS;
    use proptest::test_runner::TestRunner;

    #[test]
    fn generated_uuids_parse() {
        let mut runner = TestRunner::default();
        runner
            .run(&uuid_strategy(), |id| {
                prop_assert!(Uuid::try_parse(&id).is_ok());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn malformed_ids_do_not_parse() {
        let mut runner = TestRunner::default();
        runner
            .run(&malformed_id_strategy(), |id| {
                prop_assert!(Uuid::try_parse(&id).is_err());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn local_records_have_ids() {
        let mut runner = TestRunner::default();
        runner
            .run(&local_record_strategy(&FARMS), |record| {
                prop_assert!(record.id().is_some());
                prop_assert!(record.updated_at_millis() >= MIN_MILLIS);
                Ok(())
            })
            .unwrap();
    }
}
