//! Cluster user reconciliation for ReconFlow
//!
//! Lists managed users on every cluster, diffs them against the user
//! bindings declared through roles, and deletes (optionally creates) users
//! to match.
//!
//! # Requirements
//!
//! - `oc` must be installed (or its path configured)
//! - Each managed cluster declares an automation token secret

pub mod client;
pub mod integration;
pub mod map;
pub mod oc;
pub mod users;

pub use client::{ClientFactory, ClusterClient, LiveUser, MANAGED_IDENTITY_PREFIX};
pub use integration::{ClusterUsersIntegration, UsersOptions, UsersReport, event_message};
pub use map::ClusterMap;
pub use oc::{OcClient, OcFactory, parse_users};
pub use users::{ActionExecutor, CurrentUsers, ExecOutcome, fetch_current};
