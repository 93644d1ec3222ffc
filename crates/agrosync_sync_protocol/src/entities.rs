//! Field tables for the synced farm entities.
//!
//! [`ALL_ENTITIES`] lists them parents-first so that a push never upserts a
//! child row before the row it references.

use crate::mapper::{EntityDef, FieldDefault, FieldKind, FieldSpec};

const fn number(local: &'static str, remote: &'static str) -> FieldSpec {
    FieldSpec::new(local, remote, FieldKind::Number, FieldDefault::Omit)
}

const fn json(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, name, FieldKind::Json, FieldDefault::Omit)
}

/// Customers owning farms and placing orders.
pub static CLIENTS: EntityDef = EntityDef {
    collection: "clients",
    table: "clients",
    fields: &[
        FieldSpec::text("name"),
        FieldSpec::text("email"),
        FieldSpec::text("phone"),
        FieldSpec::text("address"),
        FieldSpec::new("taxId", "tax_id", FieldKind::Text, FieldDefault::Omit),
        FieldSpec::text("notes"),
    ],
    preserved: &[],
    references: &[],
};

/// Storage sites for products.
pub static WAREHOUSES: EntityDef = EntityDef {
    collection: "warehouses",
    table: "warehouses",
    fields: &[
        FieldSpec::text("name"),
        FieldSpec::text("location"),
        FieldSpec::reference("farmId", "farm_id"),
        number("capacity", "capacity"),
    ],
    preserved: &[],
    references: &["farmId"],
};

/// Agricultural inputs (seed, fertilizer, agrochemicals).
pub static PRODUCTS: EntityDef = EntityDef {
    collection: "products",
    table: "products",
    fields: &[
        FieldSpec::text("name"),
        FieldSpec::text("category"),
        FieldSpec::text("unit"),
        FieldSpec::new(
            "activeIngredient",
            "active_ingredient",
            FieldKind::Text,
            FieldDefault::Omit,
        ),
        number("price", "price"),
    ],
    preserved: &[],
    references: &[],
};

/// Farms, each belonging to a client.
pub static FARMS: EntityDef = EntityDef {
    collection: "farms",
    table: "farms",
    fields: &[
        FieldSpec::reference("clientId", "client_id"),
        FieldSpec::text("name"),
        FieldSpec::text("location"),
        number("area", "area"),
        json("boundary"),
    ],
    preserved: &["boundary"],
    references: &["clientId"],
};

/// Lots (fields/paddocks) within a farm.
pub static LOTS: EntityDef = EntityDef {
    collection: "lots",
    table: "lots",
    fields: &[
        FieldSpec::reference("farmId", "farm_id"),
        FieldSpec::text("name"),
        number("area", "area"),
        FieldSpec::text("crop"),
        json("boundary"),
    ],
    preserved: &["boundary"],
    references: &["farmId"],
};

/// Product quantities held in a warehouse.
pub static STOCK: EntityDef = EntityDef {
    collection: "stock",
    table: "stock",
    fields: &[
        FieldSpec::reference("productId", "product_id"),
        FieldSpec::reference("warehouseId", "warehouse_id"),
        number("quantity", "quantity").or(FieldDefault::Integer(0)),
        FieldSpec::text("unit"),
    ],
    preserved: &[],
    references: &["productId", "warehouseId"],
};

/// Work or purchase orders.
pub static ORDERS: EntityDef = EntityDef {
    collection: "orders",
    table: "orders",
    fields: &[
        FieldSpec::reference("clientId", "client_id"),
        FieldSpec::reference("farmId", "farm_id"),
        FieldSpec::reference("lotId", "lot_id"),
        FieldSpec::text("status").or(FieldDefault::Text("pending")),
        FieldSpec::new("items", "items", FieldKind::Json, FieldDefault::EmptyArray),
        FieldSpec::new("dueDate", "due_date", FieldKind::Timestamp, FieldDefault::Null),
        FieldSpec::text("notes"),
    ],
    preserved: &[],
    references: &["clientId", "farmId", "lotId"],
};

/// Stock movements in and out of warehouses.
pub static MOVEMENTS: EntityDef = EntityDef {
    collection: "movements",
    table: "movements",
    fields: &[
        FieldSpec::reference("productId", "product_id"),
        FieldSpec::reference("warehouseId", "warehouse_id"),
        FieldSpec::reference("orderId", "order_id"),
        FieldSpec::new("movementType", "movement_type", FieldKind::Text, FieldDefault::Omit),
        number("quantity", "quantity").or(FieldDefault::Integer(0)),
        FieldSpec::new("date", "date", FieldKind::Timestamp, FieldDefault::Now),
    ],
    preserved: &[],
    references: &["productId", "warehouseId", "orderId"],
};

/// Field observations (pests, weeds, crop state).
pub static OBSERVATIONS: EntityDef = EntityDef {
    collection: "observations",
    table: "observations",
    fields: &[
        FieldSpec::reference("farmId", "farm_id"),
        FieldSpec::reference("lotId", "lot_id"),
        FieldSpec::text("text"),
        FieldSpec::text("severity"),
        json("location"),
        FieldSpec::new("photos", "photos", FieldKind::Json, FieldDefault::EmptyArray),
    ],
    preserved: &["location"],
    references: &["farmId", "lotId"],
};

/// Audit trail of user actions.
pub static ACTIVITY_LOGS: EntityDef = EntityDef {
    collection: "activityLogs",
    table: "activity_logs",
    fields: &[
        FieldSpec::new("entityType", "entity_type", FieldKind::Text, FieldDefault::Omit),
        FieldSpec::reference("entityId", "entity_id"),
        FieldSpec::text("action"),
        FieldSpec::new("userId", "user_id", FieldKind::Text, FieldDefault::Null),
        FieldSpec::new("details", "details", FieldKind::Json, FieldDefault::EmptyObject),
    ],
    preserved: &[],
    references: &["entityId"],
};

/// Every synced entity, parents before children.
pub static ALL_ENTITIES: [&EntityDef; 10] = [
    &CLIENTS,
    &FARMS,
    &WAREHOUSES,
    &PRODUCTS,
    &LOTS,
    &STOCK,
    &ORDERS,
    &MOVEMENTS,
    &OBSERVATIONS,
    &ACTIVITY_LOGS,
];

/// Finds an entity by local collection name.
#[must_use]
pub fn by_collection(collection: &str) -> Option<&'static EntityDef> {
    ALL_ENTITIES.iter().copied().find(|e| e.collection == collection)
}

/// Finds an entity by remote table name.
#[must_use]
pub fn by_table(table: &str) -> Option<&'static EntityDef> {
    ALL_ENTITIES.iter().copied().find(|e| e.table == table)
}
