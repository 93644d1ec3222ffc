//! Verify command implementation.

use super::open_store;
use agrosync_store::LocalStore;
use agrosync_sync_protocol::{entities, invalid_reference_fields, UuidReferenceValidator};
use std::path::Path;

/// A record the push engine would delete on its next rejection.
#[derive(Debug, PartialEq, Eq)]
pub struct Finding {
    /// Collection name.
    pub collection: String,
    /// Record id, or `<missing>`.
    pub id: String,
    /// Fields holding malformed identifiers.
    pub fields: Vec<String>,
}

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: usize,
    /// Collections with no known mapping.
    pub skipped_collections: Vec<String>,
    /// Records with malformed identifiers.
    pub findings: Vec<Finding>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Checks every record of every synced collection.
pub fn verify_store(store: &dyn LocalStore) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let validator = UuidReferenceValidator::new();
    let mut result = VerifyResult::default();

    for name in store.collections()? {
        let Some(entity) = entities::by_collection(&name) else {
            result.skipped_collections.push(name);
            continue;
        };
        for record in store.get_all(&name)? {
            result.records_checked += 1;
            let fields = invalid_reference_fields(&record, entity, &validator);
            if !fields.is_empty() {
                result.findings.push(Finding {
                    collection: name.clone(),
                    id: record.id().unwrap_or("<missing>").to_string(),
                    fields,
                });
            }
        }
    }
    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {}", path.display());
    println!();

    let store = open_store(path)?;
    let result = verify_store(&store)?;

    for name in &result.skipped_collections {
        println!("Skipping unmapped collection: {name}");
    }
    for finding in &result.findings {
        println!(
            "  {}/{}: malformed {}",
            finding.collection,
            finding.id,
            finding.fields.join(", ")
        );
    }
    println!("Records checked: {}", result.records_checked);

    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!(
            "✗ {} record(s) would be self-healed on the next rejected push",
            result.findings.len()
        );
        Err("Verification failed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrosync_store::{InMemoryStore, Record};

    const LOT: &str = "7d9c1f52-6c3e-4b1a-8f0e-2a4b6c8d0e1f";
    const FARM: &str = "3a1b5c7d-9e0f-4a2b-8c4d-6e8f0a2b4c6d";

    #[test]
    fn reports_malformed_references() {
        let store = InMemoryStore::new();
        store
            .put("lots", Record::with_id(LOT).with("farmId", FARM))
            .unwrap();
        store
            .put("lots", Record::with_id("lot-7").with("farmId", "farm-1"))
            .unwrap();
        store.put("notes", Record::with_id("n1")).unwrap();

        let result = verify_store(&store).unwrap();

        assert_eq!(result.records_checked, 2);
        assert_eq!(result.skipped_collections, vec!["notes".to_string()]);
        assert_eq!(
            result.findings,
            vec![Finding {
                collection: "lots".into(),
                id: "lot-7".into(),
                fields: vec!["id".into(), "farmId".into()],
            }]
        );
        assert!(!result.is_ok());
    }
}
