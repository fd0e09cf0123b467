//! Cluster name → client

use crate::client::{ClientFactory, ClusterClient};
use reconflow_core::{ClusterInfo, ErrorRegistry, ReconcileError, Result, SecretReader};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One client per managed, reachable cluster
#[derive(Clone, Default)]
pub struct ClusterMap {
    clients: BTreeMap<String, Arc<dyn ClusterClient>>,
}

impl ClusterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every managed cluster
    ///
    /// Unmanaged clusters are skipped. A cluster without a usable token is
    /// registered as an error and left out.
    pub fn build(
        clusters: &[ClusterInfo],
        secrets: &dyn SecretReader,
        factory: &dyn ClientFactory,
        errors: &ErrorRegistry,
    ) -> Self {
        let mut map = Self::new();

        for cluster in clusters {
            if cluster.unmanaged {
                debug!(cluster = %cluster.name, "Skipping unmanaged cluster");
                continue;
            }

            let Some(token_ref) = &cluster.automation_token else {
                errors.register(
                    cluster.name.as_str(),
                    &ReconcileError::InvalidConfig(format!(
                        "[{}] cluster has no automation token",
                        cluster.name
                    )),
                );
                continue;
            };

            match secrets.read(token_ref) {
                Ok(token) => map.insert(factory.client(cluster, token)),
                Err(e) => errors.register(cluster.name.as_str(), &e),
            }
        }

        map
    }

    pub fn insert(&mut self, client: Arc<dyn ClusterClient>) {
        self.clients.insert(client.cluster().to_string(), client);
    }

    pub fn client_for(&self, cluster: &str) -> Result<Arc<dyn ClusterClient>> {
        self.clients
            .get(cluster)
            .cloned()
            .ok_or_else(|| ReconcileError::UnknownCluster(cluster.to_string()))
    }

    pub fn contains(&self, cluster: &str) -> bool {
        self.clients.contains_key(cluster)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
