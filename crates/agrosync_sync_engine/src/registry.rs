//! Collection-to-table mapper registry.

use agrosync_sync_protocol::{EntityDef, EntityMapper, ALL_ENTITIES};
use std::fmt;
use std::sync::Arc;

/// One synced collection: its local name, remote table and mapper.
#[derive(Clone)]
pub struct CollectionBinding {
    /// Local collection name.
    pub collection: String,
    /// Remote table name.
    pub table: String,
    /// Mapper between the two shapes.
    pub mapper: Arc<dyn EntityMapper>,
}

impl fmt::Debug for CollectionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionBinding")
            .field("collection", &self.collection)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// The ordered set of collections a sync cycle visits.
///
/// Push and pull walk bindings in registration order.
#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    bindings: Vec<CollectionBinding>,
}

impl MapperRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every farm entity, parents first.
    pub fn farm_defaults() -> Self {
        ALL_ENTITIES
            .iter()
            .copied()
            .fold(Self::new(), |registry, entity| registry.with_entity(entity))
    }

    /// Registers a mapper. A binding with the same collection is replaced in place.
    pub fn register(
        &mut self,
        collection: impl Into<String>,
        table: impl Into<String>,
        mapper: Arc<dyn EntityMapper>,
    ) {
        let binding = CollectionBinding {
            collection: collection.into(),
            table: table.into(),
            mapper,
        };
        match self
            .bindings
            .iter_mut()
            .find(|b| b.collection == binding.collection)
        {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
    }

    /// Builder-style [`register`](Self::register) for a declarative entity.
    pub fn with_entity(mut self, entity: &'static EntityDef) -> Self {
        self.register(entity.collection, entity.table, Arc::new(entity));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_mapper(
        mut self,
        collection: impl Into<String>,
        table: impl Into<String>,
        mapper: impl EntityMapper + 'static,
    ) -> Self {
        self.register(collection, table, Arc::new(mapper));
        self
    }

    /// Finds a binding by local collection name.
    pub fn by_collection(&self, collection: &str) -> Option<&CollectionBinding> {
        self.bindings.iter().find(|b| b.collection == collection)
    }

    /// Finds a binding by remote table name.
    pub fn by_table(&self, table: &str) -> Option<&CollectionBinding> {
        self.bindings.iter().find(|b| b.table == table)
    }

    /// Iterates bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CollectionBinding> {
        self.bindings.iter()
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrosync_store::Record;
    use agrosync_sync_protocol::entities::LOTS;
    use agrosync_sync_protocol::RemoteRow;

    struct Passthrough;

    impl EntityMapper for Passthrough {
        fn to_remote(&self, local: &Record) -> RemoteRow {
            local.as_map().clone()
        }

        fn to_local(&self, remote: &RemoteRow) -> Record {
            Record::from(remote.clone())
        }
    }

    #[test]
    fn farm_defaults_cover_all_entities() {
        let registry = MapperRegistry::farm_defaults();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.iter().next().map(|b| b.collection.as_str()), Some("clients"));
        assert_eq!(
            registry.by_table("activity_logs").map(|b| b.collection.as_str()),
            Some("activityLogs")
        );
        assert_eq!(
            registry.by_collection("farms").map(|b| b.mapper.preserved_fields().to_vec()),
            Some(vec!["boundary"])
        );
    }

    #[test]
    fn register_replaces_in_place() {
        let registry = MapperRegistry::new()
            .with_entity(&LOTS)
            .with_mapper("notes", "notes", Passthrough)
            .with_mapper("lots", "lots_v2", Passthrough);

        let tables: Vec<_> = registry.iter().map(|b| b.table.as_str()).collect();
        assert_eq!(tables, vec!["lots_v2", "notes"]);
        assert!(registry.by_table("lots").is_none());
    }
}
