//! Cluster client contract

use async_trait::async_trait;
use reconflow_core::{ClusterInfo, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity provider prefix of users this tool manages
pub const MANAGED_IDENTITY_PREFIX: &str = "github";

/// A user as listed by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveUser {
    pub name: String,
    #[serde(default)]
    pub identities: Vec<String>,
}

impl LiveUser {
    /// Exactly one identity, from the managed provider
    pub fn is_managed(&self) -> bool {
        matches!(self.identities.as_slice(), [only] if only.starts_with(MANAGED_IDENTITY_PREFIX))
    }
}

/// Primitive user operations against one cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    fn cluster(&self) -> &str;

    async fn list_users(&self) -> Result<Vec<LiveUser>>;

    /// [`reconflow_core::ReconcileError::NotFound`] when the user is absent
    async fn delete_user(&self, name: &str) -> Result<()>;

    async fn create_user(&self, name: &str) -> Result<()>;
}

/// Creates a client for a managed cluster from its resolved token
pub trait ClientFactory: Send + Sync {
    fn client(&self, cluster: &ClusterInfo, token: String) -> Arc<dyn ClusterClient>;
}
