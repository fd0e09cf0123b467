//! oc CLI wrapper

use crate::client::{ClientFactory, ClusterClient, LiveUser, MANAGED_IDENTITY_PREFIX};
use async_trait::async_trait;
use reconflow_core::{ClusterInfo, ReconcileError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// oc CLI wrapper bound to one cluster
pub struct OcClient {
    binary: PathBuf,
    cluster: String,
    server: String,
    token: String,
}

/// Failure of one oc invocation, before attribution
enum OcFailure {
    NotFound(String),
    Spawn(std::io::Error),
    Exit(String),
}

impl OcClient {
    pub fn new(
        binary: impl Into<PathBuf>,
        cluster: impl Into<String>,
        server: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            cluster: cluster.into(),
            server: server.into(),
            token: token.into(),
        }
    }

    /// Run an oc command and return stdout
    async fn run_command(&self, args: &[&str]) -> std::result::Result<String, OcFailure> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--server").arg(&self.server);
        cmd.arg("--token").arg(&self.token);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(cluster = %self.cluster, "Running: oc {}", args.join(" "));

        let output = cmd.output().await.map_err(OcFailure::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("NotFound") || stderr.contains("not found") {
                return Err(OcFailure::NotFound(stderr));
            }
            return Err(OcFailure::Exit(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn backend(&self, failure: OcFailure) -> ReconcileError {
        match failure {
            OcFailure::NotFound(msg) | OcFailure::Exit(msg) => {
                ReconcileError::backend(&self.cluster, msg)
            }
            OcFailure::Spawn(e) => ReconcileError::backend(&self.cluster, e),
        }
    }

    fn execution(&self, subject: &str, failure: OcFailure) -> ReconcileError {
        match failure {
            OcFailure::NotFound(_) => ReconcileError::NotFound(format!("{}/{}", self.cluster, subject)),
            OcFailure::Exit(msg) => ReconcileError::execution(&self.cluster, msg),
            OcFailure::Spawn(e) => ReconcileError::backend(&self.cluster, e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    items: Vec<UserItem>,
}

#[derive(Debug, Deserialize)]
struct UserItem {
    metadata: Metadata,
    #[serde(default)]
    identities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
}

/// Parse `oc get users -o json`
pub fn parse_users(json: &str) -> Result<Vec<LiveUser>> {
    let list: UserList = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| LiveUser {
            name: item.metadata.name,
            identities: item.identities.unwrap_or_default(),
        })
        .collect())
}

#[async_trait]
impl ClusterClient for OcClient {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    async fn list_users(&self) -> Result<Vec<LiveUser>> {
        let output = self
            .run_command(&["get", "users", "-o", "json"])
            .await
            .map_err(|f| self.backend(f))?;
        parse_users(&output)
    }

    async fn delete_user(&self, name: &str) -> Result<()> {
        self.run_command(&["delete", "user", name])
            .await
            .map_err(|f| self.execution(name, f))?;
        Ok(())
    }

    async fn create_user(&self, name: &str) -> Result<()> {
        let identity = format!("{}:{}", MANAGED_IDENTITY_PREFIX, name);
        for args in [
            vec!["create", "user", name],
            vec!["create", "identity", identity.as_str()],
            vec!["create", "useridentitymapping", identity.as_str(), name],
        ] {
            self.run_command(&args)
                .await
                .map_err(|f| self.execution(name, f))?;
        }
        Ok(())
    }
}

/// Builds [`OcClient`]s using one oc binary
#[derive(Debug, Clone)]
pub struct OcFactory {
    binary: PathBuf,
}

impl Default for OcFactory {
    fn default() -> Self {
        Self::new("oc")
    }
}

impl OcFactory {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ClientFactory for OcFactory {
    fn client(&self, cluster: &ClusterInfo, token: String) -> Arc<dyn ClusterClient> {
        Arc::new(OcClient::new(
            self.binary.clone(),
            &cluster.name,
            &cluster.server_url,
            token,
        ))
    }
}
