//! Configuration for the sync engine.

use agrosync_sync_protocol::{ReferenceValidator, RejectionClassifier, UuidReferenceValidator};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Clone)]
pub struct SyncConfig {
    /// Deadline for a single remote call (one upsert, one table select).
    pub request_timeout: Duration,
    /// Deadline for a whole push-then-pull cycle.
    pub cycle_timeout: Duration,
    /// How long `success`/`error` stays published before reverting to `idle`.
    pub status_reset_delay: Duration,
    /// Classifies rejected upserts.
    pub classifier: RejectionClassifier,
    /// Decides which identifiers are corrupt enough to self-heal.
    pub reference_validator: Arc<dyn ReferenceValidator>,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            cycle_timeout: Duration::from_secs(300),
            status_reset_delay: Duration::from_secs(3),
            classifier: RejectionClassifier::default(),
            reference_validator: Arc::new(UuidReferenceValidator::new()),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the per-cycle timeout.
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    /// Sets the status auto-revert delay.
    pub fn with_status_reset_delay(mut self, delay: Duration) -> Self {
        self.status_reset_delay = delay;
        self
    }

    /// Sets the rejection classifier.
    pub fn with_classifier(mut self, classifier: RejectionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the reference validator.
    pub fn with_reference_validator(mut self, validator: impl ReferenceValidator + 'static) -> Self {
        self.reference_validator = Arc::new(validator);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("request_timeout", &self.request_timeout)
            .field("cycle_timeout", &self.cycle_timeout)
            .field("status_reset_delay", &self.status_reset_delay)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.status_reset_delay, Duration::from_secs(3));
        assert!(config.cycle_timeout > config.request_timeout);
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_request_timeout(Duration::from_millis(50))
            .with_cycle_timeout(Duration::from_secs(1))
            .with_status_reset_delay(Duration::ZERO)
            .with_reference_validator(|_: &str, v: &Value| v.is_string());

        assert_eq!(config.request_timeout, Duration::from_millis(50));
        assert_eq!(config.cycle_timeout, Duration::from_secs(1));
        assert_eq!(config.status_reset_delay, Duration::ZERO);
        assert!(config.reference_validator.is_valid("id", &Value::from("x")));
        assert!(format!("{config:?}").contains("request_timeout"));
    }
}
