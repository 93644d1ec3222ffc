//! Property tests for the merge rule as applied through the engine's
//! merge paths, and for mapper totality.

use agrosync_store::{InMemoryStore, LocalStore, Record};
use agrosync_sync_engine::{apply_change_event, MapperRegistry, RemoteMerger, RowMerge};
use agrosync_sync_protocol::{
    coerce, entities, ChangeEvent, EntityDef, EntityMapper, RemoteRow, ALL_ENTITIES,
};
use agrosync_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::Value;

fn to_row(record: &Record, entity: &EntityDef) -> RemoteRow {
    entity.to_remote(record)
}

/// Applies `row` either as a pulled row or as a realtime UPDATE.
fn apply(store: &InMemoryStore, merger: &RemoteMerger, row: RemoteRow, via_realtime: bool) {
    let registry = MapperRegistry::farm_defaults();
    if via_realtime {
        apply_change_event(store, &registry, merger, &ChangeEvent::update("farms", row, None))
            .unwrap();
    } else {
        let binding = registry.by_collection("farms").unwrap();
        merger.merge_row(store, binding, &row).unwrap();
    }
}

proptest! {
    #[test]
    fn pull_and_realtime_commute((a, b) in version_pair_strategy(), a_first_via_realtime: bool) {
        let merger = RemoteMerger::new();
        let row_a = to_row(&a, &entities::FARMS);
        let row_b = to_row(&b, &entities::FARMS);

        let one = InMemoryStore::new();
        apply(&one, &merger, row_a.clone(), a_first_via_realtime);
        apply(&one, &merger, row_b.clone(), !a_first_via_realtime);

        let two = InMemoryStore::new();
        apply(&two, &merger, row_b, a_first_via_realtime);
        apply(&two, &merger, row_a, !a_first_via_realtime);

        let left = one.get("farms", "r1").unwrap().unwrap();
        let right = two.get("farms", "r1").unwrap().unwrap();
        prop_assert_eq!(left.updated_at_millis(), right.updated_at_millis());
        if a.updated_at_millis() != b.updated_at_millis() {
            prop_assert_eq!(left, right);
        }
    }

    #[test]
    fn local_kept_unless_remote_strictly_newer((local, remote) in version_pair_strategy()) {
        let store = InMemoryStore::new();
        store.put("farms", local.clone()).unwrap();
        let registry = MapperRegistry::farm_defaults();
        let binding = registry.by_collection("farms").unwrap();

        let merge = RemoteMerger::new()
            .merge_row(&store, binding, &to_row(&remote, &entities::FARMS))
            .unwrap();

        let stored = store.get("farms", "r1").unwrap().unwrap();
        if remote.updated_at_millis() > local.updated_at_millis() {
            prop_assert!(matches!(merge, RowMerge::Updated { .. }), "remote should replace local");
            prop_assert_eq!(stored.get_str("name"), Some("b"));
            prop_assert!(stored.is_synced());
        } else {
            prop_assert_eq!(merge, RowMerge::Unchanged);
            prop_assert_eq!(stored, local);
        }
    }

    #[test]
    fn populated_boundary_survives_empty_remote(
        boundary in boundary_strategy(),
        empty in empty_value_strategy(),
        t1 in millis_strategy(),
        delta in 1i64..1_000_000,
    ) {
        let store = InMemoryStore::new();
        store
            .put("farms", at(Record::with_id("r1").with("boundary", boundary.clone()), t1))
            .unwrap();
        let mut row = to_row(&at(Record::with_id("r1"), t1 + delta), &entities::FARMS);
        match empty {
            Some(value) => { row.insert("boundary".into(), value); }
            None => { row.remove("boundary"); }
        }

        let registry = MapperRegistry::farm_defaults();
        RemoteMerger::new()
            .merge_row(&store, registry.by_collection("farms").unwrap(), &row)
            .unwrap();

        let stored = store.get("farms", "r1").unwrap().unwrap();
        prop_assert_eq!(stored.get("boundary"), Some(&boundary));
        prop_assert_eq!(stored.updated_at_millis(), t1 + delta);
    }

    #[test]
    fn remote_to_local_is_total(
        (entity, row) in (0..ALL_ENTITIES.len()).prop_flat_map(|i| {
            (Just(ALL_ENTITIES[i]), remote_row_strategy(ALL_ENTITIES[i]))
        })
    ) {
        let local = entity.to_local(&row);
        prop_assert!(local.is_synced());
        if let Some(Value::String(id)) = row.get("id") {
            if !id.trim().is_empty() {
                prop_assert_eq!(local.id(), Some(id.trim()));
            }
        }
    }

    #[test]
    fn local_to_remote_is_well_typed(
        (entity, record) in (0..ALL_ENTITIES.len()).prop_flat_map(|i| {
            (Just(ALL_ENTITIES[i]), local_record_strategy(ALL_ENTITIES[i]))
        })
    ) {
        let remote = entity.to_remote(&record);
        prop_assert!(!remote.contains_key("synced"));
        prop_assert_eq!(remote.get("id").and_then(Value::as_str), record.id());
        for spec in entity.all_fields() {
            if let Some(value) = remote.get(spec.remote) {
                prop_assert!(
                    coerce(spec.kind, value).is_some(),
                    "{}.{} = {}",
                    entity.table,
                    spec.remote,
                    value
                );
            }
        }
    }
}

#[test]
fn every_entity_maps_its_fixture() {
    for (collection, record) in farm_graph() {
        let registry = MapperRegistry::farm_defaults();
        let binding = registry.by_collection(collection).unwrap();
        let row = binding.mapper.to_remote(&record);
        let back = binding.mapper.to_local(&row);
        assert_eq!(back.id(), record.id(), "{collection}");
        assert_eq!(back.updated_at_millis(), record.updated_at_millis(), "{collection}");
    }
}
