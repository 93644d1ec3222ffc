//! Detection of malformed record identifiers.

use crate::mapper::EntityMapper;
use agrosync_store::{fields, Record};
use serde_json::Value;
use uuid::Uuid;

/// Decides whether an identifier value is well formed.
pub trait ReferenceValidator: Send + Sync {
    /// Returns true if `value` is acceptable for `field`.
    fn is_valid(&self, field: &str, value: &Value) -> bool;
}

impl<F> ReferenceValidator for F
where
    F: Fn(&str, &Value) -> bool + Send + Sync,
{
    fn is_valid(&self, field: &str, value: &Value) -> bool {
        self(field, value)
    }
}

/// Accepts hyphenated UUID strings.
///
/// Values starting with one of the configured legacy prefixes are rejected
/// even if the remainder parses.
#[derive(Debug, Clone, Default)]
pub struct UuidReferenceValidator {
    legacy_prefixes: Vec<String>,
}

impl UuidReferenceValidator {
    /// Creates a validator with no legacy prefixes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects values starting with `prefix`.
    #[must_use]
    pub fn with_legacy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.legacy_prefixes.push(prefix.into());
        self
    }
}

impl ReferenceValidator for UuidReferenceValidator {
    fn is_valid(&self, _field: &str, value: &Value) -> bool {
        let Some(s) = value.as_str() else {
            return false;
        };
        if self.legacy_prefixes.iter().any(|p| s.starts_with(p.as_str())) {
            return false;
        }
        s.len() == 36 && Uuid::try_parse(s).is_ok()
    }
}

/// Returns the fields of `record` that fail `validator`.
///
/// `id` is always checked. Reference fields are checked only when present
/// and non-null.
pub fn invalid_reference_fields(
    record: &Record,
    mapper: &dyn EntityMapper,
    validator: &dyn ReferenceValidator,
) -> Vec<String> {
    let mut invalid = Vec::new();
    let id = record.get(fields::ID).unwrap_or(&Value::Null);
    if !validator.is_valid(fields::ID, id) {
        invalid.push(fields::ID.to_string());
    }
    for field in mapper.reference_fields() {
        match record.get(field) {
            None | Some(Value::Null) => {}
            Some(value) => {
                if !validator.is_valid(field, value) {
                    invalid.push((*field).to_string());
                }
            }
        }
    }
    invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LOTS;
    use serde_json::json;

    const GOOD: &str = "6f1c7a3e-2b0d-4c8e-9a51-3d2f8b7e6c10";

    #[test]
    fn uuid_validator() {
        let validator = UuidReferenceValidator::new();
        assert!(validator.is_valid("id", &json!(GOOD)));
        assert!(!validator.is_valid("id", &json!("6f1c7a3e2b0d4c8e9a513d2f8b7e6c10")));
        assert!(!validator.is_valid("id", &json!("farm-1")));
        assert!(!validator.is_valid("id", &json!(12)));
        assert!(!validator.is_valid("id", &Value::Null));
    }

    #[test]
    fn legacy_prefixes() {
        let validator = UuidReferenceValidator::new().with_legacy_prefix("6f1c");
        assert!(!validator.is_valid("id", &json!(GOOD)));
    }

    #[test]
    fn finds_bad_fields() {
        let validator = UuidReferenceValidator::new();
        let record = Record::with_id(GOOD).with("farmId", "farm-legacy-7");
        assert_eq!(
            invalid_reference_fields(&record, &LOTS, &validator),
            vec!["farmId".to_string()]
        );

        let record = Record::with_id("lot-3").with("farmId", Value::Null);
        assert_eq!(
            invalid_reference_fields(&record, &LOTS, &validator),
            vec!["id".to_string()]
        );

        let record = Record::with_id(GOOD).with("farmId", GOOD);
        assert!(invalid_reference_fields(&record, &LOTS, &validator).is_empty());
    }

    #[test]
    fn closures_are_validators() {
        let only_short = |_: &str, v: &Value| v.as_str().is_some_and(|s| s.len() < 4);
        let record = Record::with_id("abc").with("farmId", "abcdef");
        assert_eq!(
            invalid_reference_fields(&record, &LOTS, &only_short),
            vec!["farmId".to_string()]
        );
    }
}
