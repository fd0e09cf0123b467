//! Per-account client registry
//!
//! Each account owns its resource graph and the configuration artifact
//! rendered from it. Clients never share state; the registry only routes
//! specs to them and collects their artifacts.

use crate::error::{ReconcileError, Result};
use crate::graph::ResourceGraph;
use crate::spec::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Where the provider keeps state for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type (e.g., "s3")
    pub kind: String,
    pub settings: BTreeMap<String, serde_json::Value>,
}

/// Provider plugin configuration for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Local provider name (e.g., "cloudflare")
    pub name: String,
    /// Registry source (e.g., "cloudflare/cloudflare")
    pub source: String,
    pub version: String,
    pub settings: BTreeMap<String, serde_json::Value>,
}

/// One isolated client per target account
#[derive(Debug, Clone)]
pub struct AccountClient {
    name: String,
    backend: BackendConfig,
    provider: ProviderConfig,
    graph: ResourceGraph,
    rendered: Option<String>,
}

impl AccountClient {
    pub fn new(name: impl Into<String>, backend: BackendConfig, provider: ProviderConfig) -> Self {
        let name = name.into();
        Self {
            graph: ResourceGraph::new(name.clone()),
            name,
            backend,
            provider,
            rendered: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Artifact produced by the last [`AccountClient::populate`]
    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }

    pub fn add_spec(&mut self, spec: ResourceSpec) -> Result<()> {
        self.graph.insert(spec)
    }

    /// Render this client's artifact in dependency order
    pub fn populate(&mut self, renderer: &dyn ConfigRenderer) -> Result<()> {
        let ordered = self.graph.topological_order()?;
        let artifact = renderer.render(self, &ordered)?;
        self.rendered = Some(artifact);
        Ok(())
    }
}

/// Turns an account's ordered specs into a provider configuration artifact
pub trait ConfigRenderer: Send + Sync {
    /// File name of the artifact inside a working directory
    fn file_name(&self) -> &str;

    /// `ordered` lists every spec after all of its dependencies
    fn render(&self, client: &AccountClient, ordered: &[&ResourceSpec]) -> Result<String>;
}

/// Directory holding one account's materialized artifact
///
/// Temporary directories are removed when dropped; a persistent directory
/// (print-only output) is left on disk.
#[derive(Debug)]
pub enum WorkingDir {
    Temp(TempDir),
    Persistent(PathBuf),
}

impl WorkingDir {
    pub fn path(&self) -> &Path {
        match self {
            WorkingDir::Temp(dir) => dir.path(),
            WorkingDir::Persistent(path) => path,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, WorkingDir::Temp(_))
    }
}

/// Account name → client
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<String, AccountClient>,
    file_name: Option<String>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client: AccountClient) {
        debug!(account = %client.name, "Registered account client");
        self.clients.insert(client.name.clone(), client);
    }

    pub fn contains(&self, account: &str) -> bool {
        self.clients.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn get(&self, account: &str) -> Option<&AccountClient> {
        self.clients.get(account)
    }

    /// Route `spec` to the client for `spec.account`
    pub fn add_spec(&mut self, spec: ResourceSpec) -> Result<()> {
        match self.clients.get_mut(&spec.account) {
            Some(client) => client.add_spec(spec),
            None => Err(ReconcileError::UnknownAccount(spec.account)),
        }
    }

    /// Route every spec; stops at the first failure
    pub fn add_specs(&mut self, specs: impl IntoIterator<Item = ResourceSpec>) -> Result<()> {
        for spec in specs {
            self.add_spec(spec)?;
        }
        Ok(())
    }

    /// Drop an account from this cycle, discarding its specs
    pub fn abandon(&mut self, account: &str) -> Option<AccountClient> {
        let removed = self.clients.remove(account);
        if removed.is_some() {
            warn!(account = %account, "Abandoning account for this cycle");
        }
        removed
    }

    /// Have every client render its artifact
    ///
    /// An account that cannot be rendered is abandoned and returned with its
    /// error; the others are unaffected.
    pub fn populate_resources(
        &mut self,
        renderer: &dyn ConfigRenderer,
    ) -> Vec<(String, ReconcileError)> {
        let mut failed = Vec::new();

        for (name, client) in self.clients.iter_mut() {
            match client.populate(renderer) {
                Ok(()) => debug!(
                    account = %name,
                    resources = client.graph.len(),
                    "Rendered configuration"
                ),
                Err(e) => failed.push((name.clone(), e)),
            }
        }

        for (name, _) in &failed {
            self.clients.remove(name);
        }
        self.file_name = Some(renderer.file_name().to_string());
        failed
    }

    /// Write every rendered artifact to disk
    ///
    /// With `destination`, each account gets `destination/<account>/`;
    /// otherwise each account gets its own temporary directory.
    pub fn dump(&self, destination: Option<&Path>) -> Result<BTreeMap<String, WorkingDir>> {
        let file_name = self.file_name.as_deref().ok_or_else(|| {
            ReconcileError::InvalidState("dump called before populate_resources".to_string())
        })?;

        let mut dirs = BTreeMap::new();
        for (name, client) in &self.clients {
            let artifact = client.rendered().ok_or_else(|| {
                ReconcileError::InvalidState(format!("account '{}' has no rendered artifact", name))
            })?;

            let dir = match destination {
                Some(root) => {
                    let path = root.join(name);
                    std::fs::create_dir_all(&path)?;
                    WorkingDir::Persistent(path)
                }
                None => WorkingDir::Temp(
                    tempfile::Builder::new()
                        .prefix(&format!("reconflow-{}-", name))
                        .tempdir()?,
                ),
            };

            std::fs::write(dir.path().join(file_name), artifact)?;
            info!(account = %name, path = %dir.path().display(), "Wrote configuration");
            dirs.insert(name.clone(), dir);
        }

        Ok(dirs)
    }
}
