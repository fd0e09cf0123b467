//! State source adapters and external collaborator contracts

use crate::error::{ReconcileError, Result};
use crate::model::{
    CloudflareAccount, CloudflareRecord, CloudflareWorker, CloudflareZone, ClusterInfo,
    ContentRef, DesiredRecord, SecretRef, UserBinding,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Permission service that grants cluster access
pub const ROLEBINDING_SERVICE: &str = "openshift-rolebinding";

/// Scopes a reconciliation run to some accounts and/or clusters
///
/// An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub accounts: BTreeSet<String>,
    pub clusters: BTreeSet<String>,
}

impl Selector {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.accounts.insert(account.into());
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.clusters.insert(cluster.into());
        self
    }

    pub fn matches_account(&self, account: &str) -> bool {
        self.accounts.is_empty() || self.accounts.contains(account)
    }

    pub fn matches_cluster(&self, cluster: &str) -> bool {
        self.clusters.is_empty() || self.clusters.contains(cluster)
    }

    pub fn matches(&self, record: &DesiredRecord) -> bool {
        match record {
            DesiredRecord::UserBinding(b) => self.matches_cluster(&b.cluster),
            other => self.matches_account(other.scope()),
        }
    }
}

/// Declarative source of truth
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Desired entities within `selector`
    async fn fetch_desired(&self, selector: &Selector) -> Result<Vec<DesiredRecord>>;

    /// Clusters within `selector`
    async fn clusters(&self, selector: &Selector) -> Result<Vec<ClusterInfo>>;

    /// Cloudflare accounts within `selector`
    async fn cloudflare_accounts(&self, selector: &Selector) -> Result<Vec<CloudflareAccount>>;
}

/// Source-control file retrieval
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Raw file bytes, or [`ReconcileError::NotFound`]
    async fn get_file(&self, content: &ContentRef) -> Result<Vec<u8>>;
}

/// Chat notification backend
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()>;
}

/// Secret retrieval
pub trait SecretReader: Send + Sync {
    fn read(&self, secret: &SecretRef) -> Result<String>;
}

/// Reads secrets from environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretReader;

impl SecretReader for EnvSecretReader {
    fn read(&self, secret: &SecretRef) -> Result<String> {
        match std::env::var(&secret.env) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(ReconcileError::MissingSecret(secret.env.clone())),
        }
    }
}

// ============ Declared-state bundle ============

/// A user listed in a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleUser {
    #[serde(default)]
    pub github_username: Option<String>,
}

/// A permission granted by a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
}

/// Membership of a role's users in a group on one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAccess {
    pub cluster: String,
    pub group: String,
}

/// One user's membership in a cluster group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupMember {
    pub cluster: String,
    pub group: String,
    pub user: String,
}

/// A role: users plus the permissions and group access they receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub users: Vec<RoleUser>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub access: Vec<GroupAccess>,
}

impl Role {
    /// Flatten into one binding per (rolebinding cluster, GitHub user)
    pub fn user_bindings(&self) -> Vec<UserBinding> {
        let mut bindings = Vec::new();
        for permission in &self.permissions {
            if permission.service.as_deref() != Some(ROLEBINDING_SERVICE) {
                continue;
            }
            let Some(cluster) = &permission.cluster else {
                continue;
            };
            for user in &self.users {
                if let Some(username) = &user.github_username {
                    bindings.push(UserBinding::new(cluster, username));
                }
            }
        }
        bindings
    }

    /// Flatten group access into one member per (cluster, group, GitHub user)
    pub fn group_members(&self) -> Vec<GroupMember> {
        let usernames: Vec<&String> = self
            .users
            .iter()
            .filter_map(|u| u.github_username.as_ref())
            .collect();

        self.access
            .iter()
            .flat_map(|access| {
                usernames.iter().map(move |username| GroupMember {
                    cluster: access.cluster.clone(),
                    group: access.group.clone(),
                    user: (*username).clone(),
                })
            })
            .collect()
    }
}

/// On-disk declared state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredState {
    #[serde(default)]
    pub clusters: Vec<ClusterInfo>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub cloudflare_accounts: Vec<CloudflareAccount>,
    #[serde(default)]
    pub cloudflare_zones: Vec<CloudflareZone>,
    #[serde(default)]
    pub cloudflare_records: Vec<CloudflareRecord>,
    #[serde(default)]
    pub cloudflare_workers: Vec<CloudflareWorker>,
}

impl DeclaredState {
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| ReconcileError::SourceQuery(format!("invalid declared state: {}", e)))
    }

    /// Users that must exist on each cluster
    ///
    /// The union of rolebinding grants and group memberships; a user reached
    /// through both appears once.
    pub fn user_bindings(&self) -> BTreeSet<UserBinding> {
        let granted = self.roles.iter().flat_map(Role::user_bindings);
        let members = self
            .roles
            .iter()
            .flat_map(Role::group_members)
            .map(|m| UserBinding::new(m.cluster, m.user));

        granted.chain(members).collect()
    }

    /// Every declared record: bindings, then zones, records and workers
    pub fn records(&self) -> Vec<DesiredRecord> {
        self.user_bindings()
            .into_iter()
            .map(DesiredRecord::UserBinding)
            .chain(self.cloudflare_zones.iter().cloned().map(DesiredRecord::Zone))
            .chain(self.cloudflare_records.iter().cloned().map(DesiredRecord::Record))
            .chain(self.cloudflare_workers.iter().cloned().map(DesiredRecord::Worker))
            .collect()
    }
}

/// [`StateSource`] backed by a YAML bundle on disk
///
/// The file is re-read on every query so one process can serve several
/// reconciliation cycles.
#[derive(Debug, Clone)]
pub struct FileStateSource {
    path: PathBuf,
}

impl FileStateSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<DeclaredState> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ReconcileError::SourceQuery(format!("{}: {}", self.path.display(), e))
        })?;
        let state = DeclaredState::parse(&content)?;
        tracing::debug!(
            "Loaded declared state from {} ({} clusters, {} accounts)",
            self.path.display(),
            state.clusters.len(),
            state.cloudflare_accounts.len()
        );
        Ok(state)
    }
}

#[async_trait]
impl StateSource for FileStateSource {
    async fn fetch_desired(&self, selector: &Selector) -> Result<Vec<DesiredRecord>> {
        let state = self.load().await?;
        Ok(state
            .records()
            .into_iter()
            .filter(|r| selector.matches(r))
            .collect())
    }

    async fn clusters(&self, selector: &Selector) -> Result<Vec<ClusterInfo>> {
        let state = self.load().await?;
        Ok(state
            .clusters
            .into_iter()
            .filter(|c| selector.matches_cluster(&c.name))
            .collect())
    }

    async fn cloudflare_accounts(&self, selector: &Selector) -> Result<Vec<CloudflareAccount>> {
        let state = self.load().await?;
        Ok(state
            .cloudflare_accounts
            .into_iter()
            .filter(|a| selector.matches_account(&a.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordKind;
    use serial_test::serial;

    const BUNDLE: &str = r#"
clusters:
  - name: prod-1
    server_url: https://api.prod-1.example.com:6443
    automation_token: { env: PROD1_TOKEN }
  - name: legacy
    server_url: https://api.legacy.example.com:6443
    unmanaged: true
roles:
  - name: dev
    users:
      - github_username: alice
      - github_username: null
    permissions:
      - service: openshift-rolebinding
        cluster: prod-1
      - service: github-org
cloudflare_accounts:
  - name: acme
    provider_version: "3.18"
    api_credentials:
      email: { env: CF_EMAIL }
      api_token: { env: CF_TOKEN }
      account_id: { env: CF_ACCOUNT }
cloudflare_zones:
  - account: acme
    name: example.com
    settings:
      ssl: strict
cloudflare_records:
  - zone: { account: acme, name: example.com }
    name: www
    value: 192.0.2.10
    type: A
    proxied: true
cloudflare_workers:
  - zone: { account: acme, name: example.com }
    name: hello
    pattern: example.com/hello/*
    script:
      name: hello-script
      content_from_github: { repo: acme/workers, path: hello.js, ref: main }
"#;

    #[test]
    fn test_parse_bundle() {
        let state = DeclaredState::parse(BUNDLE).unwrap();
        assert_eq!(state.clusters.len(), 2);
        assert!(state.clusters[1].unmanaged);

        let records = state.records();
        let kinds: Vec<RecordKind> = records.iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::UserBinding,
                RecordKind::Zone,
                RecordKind::Record,
                RecordKind::Worker
            ]
        );
        assert_eq!(
            records[0],
            DesiredRecord::UserBinding(UserBinding::new("prod-1", "alice"))
        );
    }

    #[test]
    fn test_group_members_are_desired_users() {
        let yaml = r#"
roles:
  - name: dev
    users:
      - github_username: alice
    permissions:
      - service: openshift-rolebinding
        cluster: prod-1
  - name: viewers
    users:
      - github_username: bob
      - github_username: alice
    access:
      - cluster: prod-1
        group: dedicated-readers
      - cluster: stage-1
        group: dedicated-readers
"#;
        let state = DeclaredState::parse(yaml).unwrap();

        assert_eq!(state.roles[1].group_members().len(), 4);
        assert_eq!(
            state.user_bindings().into_iter().collect::<Vec<_>>(),
            vec![
                UserBinding::new("prod-1", "alice"),
                UserBinding::new("prod-1", "bob"),
                UserBinding::new("stage-1", "alice"),
                UserBinding::new("stage-1", "bob"),
            ]
        );
    }

    #[test]
    fn test_invalid_bundle_is_an_error() {
        let err = DeclaredState::parse("clusters: {not: a list}").unwrap_err();
        assert!(matches!(err, ReconcileError::SourceQuery(_)));
    }

    #[test]
    fn test_selector_scopes_records() {
        let state = DeclaredState::parse(BUNDLE).unwrap();
        let selector = Selector::all().with_account("other");

        let selected: Vec<_> = state
            .records()
            .into_iter()
            .filter(|r| selector.matches(r))
            .collect();

        // user bindings are scoped by cluster, not account
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].kind(), RecordKind::UserBinding);
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.yaml");
        std::fs::write(&path, BUNDLE).unwrap();

        let source = FileStateSource::new(&path);
        let accounts = source.cloudflare_accounts(&Selector::all()).await.unwrap();
        assert_eq!(accounts.len(), 1);

        let clusters = source
            .clusters(&Selector::all().with_cluster("legacy"))
            .await
            .unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "legacy");
    }

    #[test]
    fn test_missing_file_is_query_error() {
        let source = FileStateSource::new("/nonexistent/state.yaml");
        let err = tokio_test::block_on(source.fetch_desired(&Selector::all())).unwrap_err();
        assert!(matches!(err, ReconcileError::SourceQuery(_)));
    }

    #[test]
    #[serial]
    fn test_env_secret_reader() {
        temp_env::with_var("RECONFLOW_TEST_SECRET", Some("s3cr3t"), || {
            let value = EnvSecretReader
                .read(&SecretRef::env("RECONFLOW_TEST_SECRET"))
                .unwrap();
            assert_eq!(value, "s3cr3t");
        });

        temp_env::with_var_unset("RECONFLOW_TEST_SECRET", || {
            let err = EnvSecretReader
                .read(&SecretRef::env("RECONFLOW_TEST_SECRET"))
                .unwrap_err();
            assert!(matches!(err, ReconcileError::MissingSecret(_)));
        });
    }
}
