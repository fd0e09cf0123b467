//! End-to-end cluster users runs against fake clusters

use async_trait::async_trait;
use reconflow_cluster::{ClientFactory, ClusterClient, ClusterUsersIntegration, LiveUser, UsersOptions};
use reconflow_core::{
    ClusterInfo, ErrorRegistry, FileStateSource, Notifier, ReconcileError, Result, RunOutcome,
    SecretReader, SecretRef, WorkerPool,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const BUNDLE: &str = r#"
clusters:
  - name: prod-1
    server_url: https://api.prod-1.example:6443
    automation_token: { env: PROD1_TOKEN }
  - name: stage-1
    server_url: https://api.stage-1.example:6443
    automation_token: { env: STAGE1_TOKEN }
  - name: legacy
    server_url: https://api.legacy.example:6443
    unmanaged: true
roles:
  - name: dev
    users:
      - github_username: alice
      - github_username: bob
    permissions:
      - service: openshift-rolebinding
        cluster: prod-1
      - service: openshift-rolebinding
        cluster: stage-1
"#;

const SINGLE_CLUSTER: &str = r#"
clusters:
  - name: prod-1
    server_url: https://api.prod-1.example:6443
    automation_token: { env: PROD1_TOKEN }
roles:
  - name: dev
    users:
      - github_username: alice
    permissions:
      - service: openshift-rolebinding
        cluster: prod-1
"#;

struct Tokens;

impl SecretReader for Tokens {
    fn read(&self, secret: &SecretRef) -> Result<String> {
        Ok(format!("token-{}", secret.env))
    }
}

/// Fake cluster: named users, optional list failure, optional delete failure
struct FakeCluster {
    name: String,
    users: Mutex<BTreeSet<String>>,
    fail_list: bool,
    fail_delete: bool,
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ClusterClient for FakeCluster {
    fn cluster(&self) -> &str {
        &self.name
    }

    async fn list_users(&self) -> Result<Vec<LiveUser>> {
        if self.fail_list {
            return Err(ReconcileError::backend(&self.name, "connection refused"));
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .map(|u| LiveUser {
                name: u.clone(),
                identities: vec![format!("github:{}", u)],
            })
            .collect())
    }

    async fn delete_user(&self, name: &str) -> Result<()> {
        if self.fail_delete {
            return Err(ReconcileError::execution(&self.name, "forbidden"));
        }
        self.users.lock().unwrap().remove(name);
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn create_user(&self, name: &str) -> Result<()> {
        self.users.lock().unwrap().insert(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeFactory {
    clusters: BTreeMap<String, Arc<FakeCluster>>,
}

impl FakeFactory {
    fn with(mut self, name: &str, users: &[&str], fail_list: bool, fail_delete: bool) -> Self {
        self.clusters.insert(
            name.to_string(),
            Arc::new(FakeCluster {
                name: name.to_string(),
                users: Mutex::new(users.iter().map(|s| s.to_string()).collect()),
                fail_list,
                fail_delete,
                deleted: Mutex::new(Vec::new()),
            }),
        );
        self
    }

    fn deleted(&self, name: &str) -> Vec<String> {
        self.clusters[name].deleted.lock().unwrap().clone()
    }
}

impl ClientFactory for FakeFactory {
    fn client(&self, cluster: &ClusterInfo, _token: String) -> Arc<dyn ClusterClient> {
        self.clusters[&cluster.name].clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

fn write_bundle(content: &str) -> (TempDir, FileStateSource) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.yaml");
    std::fs::write(&path, content).unwrap();
    (dir, FileStateSource::new(path))
}

fn integration(
    source: FileStateSource,
    factory: Arc<FakeFactory>,
    notifier: Option<Arc<RecordingNotifier>>,
) -> ClusterUsersIntegration {
    ClusterUsersIntegration {
        source: Arc::new(source),
        secrets: Arc::new(Tokens),
        factory,
        notifier: notifier.map(|n| n as Arc<dyn Notifier>),
    }
}

fn options(dry_run: bool) -> UsersOptions {
    UsersOptions {
        dry_run,
        pool: WorkerPool::new(2),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_dry_run_reports_deletions_only() {
    let (_dir, source) = write_bundle(BUNDLE);
    let factory = Arc::new(
        FakeFactory::default()
            .with("prod-1", &["alice", "mallory"], false, false)
            .with("stage-1", &["bob"], false, false),
    );
    let errors = ErrorRegistry::new();

    let report = integration(source, factory.clone(), None)
        .run(&options(true), &errors)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::DryRunCompleted);
    // alice is missing on stage-1 but creation is off
    assert_eq!(report.summary().to_string(), "0 to create, 0 to update, 1 to delete");
    assert_eq!(report.actions[0].subject.user, "mallory");
    assert!(factory.deleted("prod-1").is_empty());
}

#[tokio::test]
async fn test_apply_deletes_and_isolates_failures() {
    let (_dir, source) = write_bundle(BUNDLE);
    let factory = Arc::new(
        FakeFactory::default()
            .with("prod-1", &["alice", "mallory"], false, false)
            .with("stage-1", &["bob", "eve"], false, true),
    );
    let errors = ErrorRegistry::new();

    let report = integration(source, factory.clone(), None)
        .run(&options(false), &errors)
        .await
        .unwrap();

    assert_eq!(factory.deleted("prod-1"), vec!["mallory"]);
    assert!(errors.has_errors_for("stage-1"));
    assert!(!errors.has_errors_for("prod-1"));
    assert_eq!(report.outcome, RunOutcome::ErrorsRegistered(1));
    assert_eq!(report.outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_unreachable_cluster_deletes_nothing() {
    let (_dir, source) = write_bundle(BUNDLE);
    let factory = Arc::new(
        FakeFactory::default()
            .with("prod-1", &["alice", "mallory"], true, false)
            .with("stage-1", &["bob", "eve"], false, false),
    );
    let errors = ErrorRegistry::new();

    integration(source, factory.clone(), None)
        .run(&options(false), &errors)
        .await
        .unwrap();

    assert!(factory.deleted("prod-1").is_empty());
    assert_eq!(factory.deleted("stage-1"), vec!["eve"]);
    assert!(errors.entries()[0].kind == reconflow_core::ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn test_create_users_opt_in() {
    let (_dir, source) = write_bundle(BUNDLE);
    let factory = Arc::new(
        FakeFactory::default()
            .with("prod-1", &["alice"], false, false)
            .with("stage-1", &[], false, false),
    );
    let errors = ErrorRegistry::new();

    let mut opts = options(false);
    opts.create_users = true;
    let report = integration(source, factory.clone(), None)
        .run(&opts, &errors)
        .await
        .unwrap();

    assert_eq!(report.summary().create, 3);
    assert_eq!(report.executed.len(), 3);
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_unlisted_cluster_gets_no_creations() {
    let (_dir, source) = write_bundle(BUNDLE);
    let factory = Arc::new(
        FakeFactory::default()
            .with("prod-1", &["alice", "bob"], true, false)
            .with("stage-1", &["bob"], false, false),
    );
    let errors = ErrorRegistry::new();

    let mut opts = options(false);
    opts.create_users = true;
    let report = integration(source, factory.clone(), None)
        .run(&opts, &errors)
        .await
        .unwrap();

    let planned: Vec<(String, String)> = report
        .actions
        .iter()
        .map(|a| (a.target.clone(), a.subject.user.clone()))
        .collect();
    assert_eq!(planned, vec![("stage-1".to_string(), "alice".to_string())]);
    assert!(errors.has_errors_for("prod-1"));
    assert_eq!(report.outcome, RunOutcome::ErrorsRegistered(1));
}

#[tokio::test]
async fn test_group_member_is_kept() {
    let bundle = r#"
clusters:
  - name: prod-1
    server_url: https://api.prod-1.example:6443
    automation_token: { env: PROD1_TOKEN }
roles:
  - name: dev
    users:
      - github_username: alice
    permissions:
      - service: openshift-rolebinding
        cluster: prod-1
  - name: readers
    users:
      - github_username: carol
    access:
      - cluster: prod-1
        group: dedicated-readers
"#;
    let (_dir, source) = write_bundle(bundle);
    let factory = Arc::new(FakeFactory::default().with(
        "prod-1",
        &["alice", "carol", "mallory"],
        false,
        false,
    ));
    let errors = ErrorRegistry::new();

    integration(source, factory.clone(), None)
        .run(&options(false), &errors)
        .await
        .unwrap();

    assert_eq!(factory.deleted("prod-1"), vec!["mallory"]);
    assert!(!errors.has_errors());
}

#[tokio::test]
async fn test_notifications_for_single_cluster() {
    let (_dir, source) = write_bundle(SINGLE_CLUSTER);
    let factory = Arc::new(FakeFactory::default().with("prod-1", &["alice", "mallory"], false, false));
    let notifier = Arc::new(RecordingNotifier::default());
    let errors = ErrorRegistry::new();

    let mut opts = options(false);
    opts.channel = Some("#ops".to_string());
    opts.output = Some("events".to_string());
    integration(source, factory, Some(notifier.clone()))
        .run(&opts, &errors)
        .await
        .unwrap();

    assert_eq!(
        *notifier.messages.lock().unwrap(),
        vec![("#ops".to_string(), "[prod-1] User mallory deleted".to_string())]
    );
}

#[tokio::test]
async fn test_no_notifications_for_multiple_clusters() {
    let (_dir, source) = write_bundle(BUNDLE);
    let factory = Arc::new(
        FakeFactory::default()
            .with("prod-1", &["alice", "mallory"], false, false)
            .with("stage-1", &["bob"], false, false),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let errors = ErrorRegistry::new();

    let mut opts = options(false);
    opts.channel = Some("#ops".to_string());
    opts.output = Some("events".to_string());
    integration(source, factory, Some(notifier.clone()))
        .run(&opts, &errors)
        .await
        .unwrap();

    assert!(notifier.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_no_declared_bindings() {
    let (_dir, source) = write_bundle("clusters: []\nroles: []\n");
    let factory = Arc::new(FakeFactory::default());
    let errors = ErrorRegistry::new();

    let report = integration(source, factory, None)
        .run(&options(true), &errors)
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::NoDesiredRecords);
    assert_ne!(report.outcome.reason(), RunOutcome::NoTargets.reason());
}
