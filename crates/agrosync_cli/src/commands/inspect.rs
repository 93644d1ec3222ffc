//! Inspect command implementation.

use super::open_store;
use agrosync_store::LocalStore;
use agrosync_sync_protocol::entities;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Records over all collections.
    pub total_records: usize,
    /// Records waiting to be pushed.
    pub total_unsynced: usize,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Remote table, if the collection is synced.
    pub table: Option<String>,
    /// Number of records.
    pub records: usize,
    /// Records with `synced != true`.
    pub unsynced: usize,
    /// Records with `deleted == true`.
    pub tombstones: usize,
}

/// Collects statistics for every collection in `store`.
pub fn collect(store: &dyn LocalStore) -> Result<Vec<CollectionStats>, Box<dyn std::error::Error>> {
    let mut stats = Vec::new();
    for name in store.collections()? {
        let records = store.get_all(&name)?;
        stats.push(CollectionStats {
            table: entities::by_collection(&name).map(|e| e.table.to_string()),
            records: records.len(),
            unsynced: records.iter().filter(|r| !r.is_synced()).count(),
            tombstones: records.iter().filter(|r| r.is_deleted()).count(),
            name,
        });
    }
    Ok(stats)
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let collections = collect(&store)?;
    let result = InspectResult {
        path: path.display().to_string(),
        total_records: collections.iter().map(|c| c.records).sum(),
        total_unsynced: collections.iter().map(|c| c.unsynced).sum(),
        collections,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text_output(&result),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("AgroSync Store Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Records:  {}", result.total_records);
    println!("Unsynced: {}", result.total_unsynced);

    if !result.collections.is_empty() {
        println!();
        println!(
            "{:<16} {:<16} {:>8} {:>9} {:>11}",
            "COLLECTION", "TABLE", "RECORDS", "UNSYNCED", "TOMBSTONES"
        );
        for c in &result.collections {
            println!(
                "{:<16} {:<16} {:>8} {:>9} {:>11}",
                c.name,
                c.table.as_deref().unwrap_or("-"),
                c.records,
                c.unsynced,
                c.tombstones
            );
        }
    }
}
