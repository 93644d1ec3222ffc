//! Classification of remote upsert rejections.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An error returned by the remote backend for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Backend error code (e.g. `PGRST204`, `22P02`).
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// HTTP status, if the backend is reached over HTTP.
    #[serde(default)]
    pub status: Option<u16>,
}

impl RemoteError {
    /// Creates an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    /// Creates an error with a code and message.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            status: None,
        }
    }

    /// Sets the HTTP status.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// How the push engine should treat a rejected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Unknown or missing column. Skipped.
    SchemaMismatch,
    /// A field expected to be an identifier is malformed. Candidate for deletion.
    InvalidReference,
    /// Anything else. Retried next cycle.
    Other,
}

/// Maps [`RemoteError`]s to [`RejectionKind`]s, by code first and then by
/// message pattern.
#[derive(Debug, Clone)]
pub struct RejectionClassifier {
    schema_codes: Vec<String>,
    reference_codes: Vec<String>,
    schema_patterns: Vec<String>,
    reference_patterns: Vec<String>,
}

impl Default for RejectionClassifier {
    fn default() -> Self {
        Self {
            schema_codes: ["PGRST204", "42703", "23502", "PGRST102"]
                .map(String::from)
                .to_vec(),
            reference_codes: vec!["22P02".to_string()],
            schema_patterns: vec!["column".to_string(), "schema cache".to_string()],
            reference_patterns: vec!["invalid input syntax for type uuid".to_string()],
        }
    }
}

impl RejectionClassifier {
    /// Creates a classifier with no rules; everything is [`RejectionKind::Other`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_codes: Vec::new(),
            reference_codes: Vec::new(),
            schema_patterns: Vec::new(),
            reference_patterns: Vec::new(),
        }
    }

    /// Adds a code treated as a schema mismatch.
    #[must_use]
    pub fn with_schema_code(mut self, code: impl Into<String>) -> Self {
        self.schema_codes.push(code.into());
        self
    }

    /// Adds a code treated as an invalid reference.
    #[must_use]
    pub fn with_reference_code(mut self, code: impl Into<String>) -> Self {
        self.reference_codes.push(code.into());
        self
    }

    /// Adds a case-insensitive message pattern treated as a schema mismatch.
    #[must_use]
    pub fn with_schema_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.schema_patterns.push(pattern.into().to_lowercase());
        self
    }

    /// Adds a case-insensitive message pattern treated as an invalid reference.
    #[must_use]
    pub fn with_reference_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.reference_patterns.push(pattern.into().to_lowercase());
        self
    }

    /// Classifies a rejection.
    #[must_use]
    pub fn classify(&self, error: &RemoteError) -> RejectionKind {
        if let Some(code) = error.code.as_deref() {
            if self.reference_codes.iter().any(|c| c == code) {
                return RejectionKind::InvalidReference;
            }
            if self.schema_codes.iter().any(|c| c == code) {
                return RejectionKind::SchemaMismatch;
            }
        }

        let message = error.message.to_lowercase();
        if self.reference_patterns.iter().any(|p| message.contains(p.as_str())) {
            RejectionKind::InvalidReference
        } else if self.schema_patterns.iter().any(|p| message.contains(p.as_str())) {
            RejectionKind::SchemaMismatch
        } else {
            RejectionKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_code() {
        let classifier = RejectionClassifier::default();
        assert_eq!(
            classifier.classify(&RemoteError::with_code("PGRST204", "whatever")),
            RejectionKind::SchemaMismatch
        );
        assert_eq!(
            classifier.classify(&RemoteError::with_code("23502", "null value")),
            RejectionKind::SchemaMismatch
        );
        assert_eq!(
            classifier.classify(&RemoteError::with_code("22P02", "bad input")),
            RejectionKind::InvalidReference
        );
    }

    #[test]
    fn classifies_by_message() {
        let classifier = RejectionClassifier::default();
        assert_eq!(
            classifier.classify(&RemoteError::new(
                "Could not find the 'foo' column of 'lots' in the schema cache"
            )),
            RejectionKind::SchemaMismatch
        );
        assert_eq!(
            classifier.classify(&RemoteError::new(
                "invalid input syntax for type uuid: \"farm-1\""
            )),
            RejectionKind::InvalidReference
        );
        assert_eq!(
            classifier.classify(&RemoteError::with_code("57014", "statement timeout").status(500)),
            RejectionKind::Other
        );
    }

    #[test]
    fn custom_rules() {
        let classifier = RejectionClassifier::empty()
            .with_reference_code("X1")
            .with_schema_pattern("NO SUCH FIELD");
        assert_eq!(
            classifier.classify(&RemoteError::with_code("X1", "")),
            RejectionKind::InvalidReference
        );
        assert_eq!(
            classifier.classify(&RemoteError::new("no such field: foo")),
            RejectionKind::SchemaMismatch
        );
        assert_eq!(
            classifier.classify(&RemoteError::with_code("PGRST204", "column")),
            RejectionKind::Other
        );
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(
            RemoteError::with_code("42P01", "relation does not exist").to_string(),
            "[42P01] relation does not exist"
        );
        assert_eq!(RemoteError::new("boom").to_string(), "boom");
    }
}
