//! ReconFlow reconciliation engine
//!
//! Drives live infrastructure toward a declared state through a
//! fetch → diff/build → plan → apply pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   desired    ┌──────────────┐   actions   ┌──────────────┐
//! │ StateSource  │─────────────▶│  diff / spec │────────────▶│  executors   │
//! │ (YAML, ...)  │   current    │   builders   │    specs    │  (cluster)   │
//! └──────────────┘              └──────┬───────┘             └──────────────┘
//!                                      │
//!                               ┌──────▼────────┐  artifacts ┌───────────────┐
//!                               │ClientRegistry │───────────▶│PlanApplyDriver│
//!                               │ (per account) │            │ plan → apply  │
//!                               └───────────────┘            └───────────────┘
//! ```
//!
//! Every unit of work (an account or a cluster) fails on its own; failures
//! land in an [`ErrorRegistry`] that decides the run's exit status.

pub mod action;
pub mod diff;
pub mod driver;
pub mod error;
pub mod error_registry;
pub mod graph;
pub mod identifier;
pub mod model;
pub mod pool;
pub mod registry;
pub mod run;
pub mod source;
pub mod spec;

// Re-exports
pub use action::{Action, ActionKind, ActionSummary, Targeted};
pub use diff::{DiffPolicy, diff, diff_by_identity};
pub use driver::{
    ApplyReport, DeltaSummary, DriverState, PlanApplyDriver, PlanReport, ProviderClient,
};
pub use error::{ErrorKind, ReconcileError, Result};
pub use error_registry::{ErrorRegistry, RegisteredError};
pub use graph::ResourceGraph;
pub use identifier::{MAX_IDENTIFIER_LEN, safe_resource_id};
pub use model::{
    CloudflareAccount, CloudflareCredentials, CloudflareRecord, CloudflareWorker, CloudflareZone,
    ClusterInfo, ContentRef, CurrentRecord, DesiredRecord, RecordKind, SecretRef,
    StateBackendDecl, UserBinding, WorkerScript, ZoneRef,
};
pub use pool::{DEFAULT_POOL_SIZE, UnitResult, WorkerPool};
pub use registry::{
    AccountClient, BackendConfig, ClientRegistry, ConfigRenderer, ProviderConfig, WorkingDir,
};
pub use run::{EVENTS_OUTPUT, RunOutcome, should_notify};
pub use spec::{ResourceRef, ResourceSpec};
pub use source::{
    ContentStore, DeclaredState, EnvSecretReader, FileStateSource, GroupAccess, GroupMember,
    Notifier, SecretReader, Selector, StateSource,
};
