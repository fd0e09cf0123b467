//! Declared and observed entity types
//!
//! Records are immutable once fetched for a reconciliation cycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user granted access to a cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserBinding {
    pub cluster: String,
    pub user: String,
}

impl UserBinding {
    pub fn new(cluster: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            user: user.into(),
        }
    }
}

/// Reference from a record or worker to its owning zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneRef {
    pub account: String,
    pub name: String,
}

/// A Cloudflare DNS zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareZone {
    pub account: String,
    pub name: String,
    #[serde(default = "default_plan")]
    pub plan: String,
    #[serde(rename = "type", default = "default_zone_type")]
    pub zone_type: String,
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

fn default_plan() -> String {
    "free".to_string()
}

fn default_zone_type() -> String {
    "full".to_string()
}

/// A DNS record inside a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareRecord {
    pub zone: ZoneRef,
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub record_type: String,
    /// 1 means "automatic" on the provider side
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

fn default_ttl() -> u32 {
    1
}

/// Location of a file in a source-control repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub repo: String,
    pub path: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Worker script whose content lives in source control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerScript {
    pub name: String,
    pub content_from_github: ContentRef,
}

/// A worker route bound to a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareWorker {
    pub zone: ZoneRef,
    pub name: String,
    pub pattern: String,
    pub script: WorkerScript,
}

/// An entity declared in the source of truth
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredRecord {
    UserBinding(UserBinding),
    Zone(CloudflareZone),
    Record(CloudflareRecord),
    Worker(CloudflareWorker),
}

/// Discriminant of [`DesiredRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    UserBinding,
    Zone,
    Record,
    Worker,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::UserBinding => write!(f, "user-binding"),
            RecordKind::Zone => write!(f, "zone"),
            RecordKind::Record => write!(f, "record"),
            RecordKind::Worker => write!(f, "worker"),
        }
    }
}

impl DesiredRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            DesiredRecord::UserBinding(_) => RecordKind::UserBinding,
            DesiredRecord::Zone(_) => RecordKind::Zone,
            DesiredRecord::Record(_) => RecordKind::Record,
            DesiredRecord::Worker(_) => RecordKind::Worker,
        }
    }

    /// The account or cluster this record belongs to
    pub fn scope(&self) -> &str {
        match self {
            DesiredRecord::UserBinding(b) => &b.cluster,
            DesiredRecord::Zone(z) => &z.account,
            DesiredRecord::Record(r) => &r.zone.account,
            DesiredRecord::Worker(w) => &w.zone.account,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DesiredRecord::UserBinding(b) => &b.user,
            DesiredRecord::Zone(z) => &z.name,
            DesiredRecord::Record(r) => &r.name,
            DesiredRecord::Worker(w) => &w.name,
        }
    }
}

/// An entity observed live on a target platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CurrentRecord {
    UserBinding(UserBinding),
}

/// Reference to a secret held outside the declared state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretRef {
    /// Environment variable holding the value
    pub env: String,
}

impl SecretRef {
    pub fn env(name: impl Into<String>) -> Self {
        Self { env: name.into() }
    }
}

/// A container-orchestration cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub server_url: String,
    #[serde(default)]
    pub automation_token: Option<SecretRef>,
    #[serde(default)]
    pub unmanaged: bool,
}

/// Credentials for a Cloudflare account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareCredentials {
    pub email: SecretRef,
    pub api_token: SecretRef,
    pub account_id: SecretRef,
}

/// Where the provider keeps its state for an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBackendDecl {
    pub bucket: String,
    pub region: String,
    pub access_key_id: SecretRef,
    pub secret_access_key: SecretRef,
}

/// A Cloudflare account managed by the reconciler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareAccount {
    pub name: String,
    pub provider_version: String,
    pub api_credentials: CloudflareCredentials,
    #[serde(default)]
    pub terraform_state: Option<StateBackendDecl>,
}
