//! Reconciliation error types

use std::time::Duration;
use thiserror::Error;

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Record '{record}' references zone '{zone}' which is not declared for account '{account}'")]
    MissingZoneReference {
        record: String,
        zone: String,
        account: String,
    },

    #[error("Could not retrieve content at {repo}:{path}@{git_ref}: {reason}")]
    ContentFetch {
        repo: String,
        path: String,
        git_ref: String,
        reason: String,
    },

    #[error("Resource {resource_type}.{identifier} is declared more than once for account '{account}'")]
    DuplicateResource {
        account: String,
        resource_type: String,
        identifier: String,
    },

    #[error("Resource {resource} in account '{account}' depends on unregistered {dependency}")]
    DanglingDependency {
        account: String,
        resource: String,
        dependency: String,
    },

    #[error("Cyclic dependency in account '{account}', stuck resources: {stuck:?}")]
    CyclicDependency { account: String, stuck: Vec<String> },

    #[error("No client registered for account: {0}")]
    UnknownAccount(String),

    #[error("No client available for cluster: {0}")]
    UnknownCluster(String),

    #[error("Secret not available: {0}")]
    MissingSecret(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State source query failed: {0}")]
    SourceQuery(String),

    #[error("Backend unavailable for {unit}: {reason}")]
    BackendUnavailable { unit: String, reason: String },

    #[error("Timeout after {after:?} for {unit}")]
    Timeout { unit: String, after: Duration },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Deletions are disabled but planned for account '{account}': {deletions:?}")]
    SafetyGateTriggered {
        account: String,
        deletions: Vec<String>,
    },

    #[error("Execution failed for {unit}: {reason}")]
    Execution { unit: String, reason: String },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid driver state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Error classes that drive propagation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing declared references; fatal to the affected resource
    Configuration,
    /// Network/auth failure reaching a platform; retryable per unit
    BackendUnavailable,
    /// Disabled-deletion detected; terminates the run
    SafetyGate,
    /// A mutation call failed
    Execution,
    /// A defect in the caller, never swallowed
    Programmer,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::BackendUnavailable => write!(f, "backend-unavailable"),
            ErrorKind::SafetyGate => write!(f, "safety-gate"),
            ErrorKind::Execution => write!(f, "execution"),
            ErrorKind::Programmer => write!(f, "programmer"),
        }
    }
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::MissingZoneReference { .. }
            | ReconcileError::ContentFetch { .. }
            | ReconcileError::DuplicateResource { .. }
            | ReconcileError::DanglingDependency { .. }
            | ReconcileError::CyclicDependency { .. }
            | ReconcileError::UnknownAccount(_)
            | ReconcileError::UnknownCluster(_)
            | ReconcileError::MissingSecret(_)
            | ReconcileError::InvalidConfig(_)
            | ReconcileError::SourceQuery(_)
            | ReconcileError::Yaml(_) => ErrorKind::Configuration,
            ReconcileError::BackendUnavailable { .. } | ReconcileError::Timeout { .. } => {
                ErrorKind::BackendUnavailable
            }
            ReconcileError::SafetyGateTriggered { .. } => ErrorKind::SafetyGate,
            ReconcileError::Execution { .. }
            | ReconcileError::NotFound(_)
            | ReconcileError::Io(_)
            | ReconcileError::Json(_) => ErrorKind::Execution,
            ReconcileError::InvalidAction(_) | ReconcileError::InvalidState(_) => {
                ErrorKind::Programmer
            }
        }
    }

    /// Whether retrying the same unit later may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound(_))
    }

    pub fn backend(unit: impl Into<String>, reason: impl ToString) -> Self {
        ReconcileError::BackendUnavailable {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execution(unit: impl Into<String>, reason: impl ToString) -> Self {
        ReconcileError::Execution {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
