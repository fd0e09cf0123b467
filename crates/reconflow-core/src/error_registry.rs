//! Run-scoped accumulation of unit failures
//!
//! One registry lives for one reconciliation run. Workers append through
//! cheap clones of the same handle; entries are never removed, so the final
//! read reflects every failure of the run.

use crate::error::{ErrorKind, ReconcileError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

/// A failure recorded against one account or cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredError {
    pub unit: String,
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Append-only, shareable error registry
#[derive(Debug, Clone, Default)]
pub struct ErrorRegistry {
    entries: Arc<Mutex<Vec<RegisteredError>>>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RegisteredError>> {
        // A panicking writer cannot leave a half-written Vec behind a push
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `error` against `unit` and log it
    pub fn register(&self, unit: impl Into<String>, error: &ReconcileError) {
        let unit = unit.into();
        tracing::error!(unit = %unit, kind = %error.kind(), "{}", error);
        self.lock().push(RegisteredError {
            unit,
            kind: error.kind(),
            message: error.to_string(),
            at: Utc::now(),
        });
    }

    /// Record a failure that has no structured error value
    pub fn register_message(&self, unit: impl Into<String>, kind: ErrorKind, message: impl Into<String>) {
        let unit = unit.into();
        let message = message.into();
        tracing::error!(unit = %unit, kind = %kind, "{}", message);
        self.lock().push(RegisteredError {
            unit,
            kind,
            message,
            at: Utc::now(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether anything was registered against `unit`
    pub fn has_errors_for(&self, unit: &str) -> bool {
        self.lock().iter().any(|e| e.unit == unit)
    }

    /// Snapshot of all entries in registration order
    pub fn entries(&self) -> Vec<RegisteredError> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_read() {
        let registry = ErrorRegistry::new();
        assert!(!registry.has_errors());

        registry.register("acme", &ReconcileError::UnknownAccount("acme".to_string()));
        registry.register_message("prod-1", ErrorKind::Execution, "delete failed");

        assert!(registry.has_errors());
        assert_eq!(registry.len(), 2);
        assert!(registry.has_errors_for("prod-1"));
        assert!(!registry.has_errors_for("stage-1"));

        let entries = registry.entries();
        assert_eq!(entries[0].unit, "acme");
        assert_eq!(entries[0].kind, ErrorKind::Configuration);
        assert_eq!(entries[1].message, "delete failed");
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let registry = ErrorRegistry::new();
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register_message(format!("unit-{}", i), ErrorKind::Execution, "boom");
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 16);
    }
}
