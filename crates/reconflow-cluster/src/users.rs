//! Live user state and the action executor

use crate::client::ClusterClient;
use crate::map::ClusterMap;
use reconflow_core::{
    Action, ActionKind, ErrorRegistry, ReconcileError, Result, UserBinding, WorkerPool,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Live users gathered from every cluster in a map
#[derive(Debug, Clone, Default)]
pub struct CurrentUsers {
    pub bindings: Vec<UserBinding>,
    /// Clusters whose users could not be listed
    pub unlisted: BTreeSet<String>,
}

impl CurrentUsers {
    /// Whether `cluster` was listed successfully
    pub fn is_known(&self, cluster: &str) -> bool {
        !self.unlisted.contains(cluster)
    }
}

/// Managed users on every cluster in `map`
///
/// A cluster that cannot be listed is registered and reported in
/// [`CurrentUsers::unlisted`]; its live state is unknown, so no action may
/// target it.
pub async fn fetch_current(
    map: &ClusterMap,
    pool: &WorkerPool,
    errors: &ErrorRegistry,
) -> CurrentUsers {
    let units: Vec<(String, String)> = map
        .clusters()
        .map(|c| (c.to_string(), c.to_string()))
        .collect();

    let results = pool
        .run(units, |cluster| async move {
            let client = map.client_for(&cluster)?;
            let users = client.list_users().await?;
            Ok(users
                .into_iter()
                .filter(|u| u.is_managed())
                .map(|u| UserBinding::new(&cluster, u.name))
                .collect::<Vec<_>>())
        })
        .await;

    let mut current = CurrentUsers::default();
    for unit in results {
        match unit.result {
            Ok(bindings) => {
                debug!(cluster = %unit.unit, users = bindings.len(), "Fetched managed users");
                current.bindings.extend(bindings);
            }
            Err(e) => {
                errors.register(unit.unit.as_str(), &e);
                current.unlisted.insert(unit.unit);
            }
        }
    }
    current
}

/// What executing an action did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Created,
    Deleted,
    /// The user was already gone
    AlreadyAbsent,
}

impl std::fmt::Display for ExecOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecOutcome::Created => write!(f, "created"),
            ExecOutcome::Deleted => write!(f, "deleted"),
            ExecOutcome::AlreadyAbsent => write!(f, "already absent"),
        }
    }
}

/// Runs one user-binding action against its cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionExecutor {
    create_enabled: bool,
}

impl ActionExecutor {
    pub fn new(create_enabled: bool) -> Self {
        Self { create_enabled }
    }

    pub async fn execute(
        &self,
        action: &Action<UserBinding>,
        client: &dyn ClusterClient,
    ) -> Result<ExecOutcome> {
        let user = &action.subject.user;
        match action.kind {
            ActionKind::Delete => match client.delete_user(user).await {
                Ok(()) => Ok(ExecOutcome::Deleted),
                Err(e) if e.is_not_found() => {
                    info!(cluster = %action.target, "User {} already absent", user);
                    Ok(ExecOutcome::AlreadyAbsent)
                }
                Err(e) => Err(e),
            },
            ActionKind::Create if self.create_enabled => {
                client.create_user(user).await?;
                Ok(ExecOutcome::Created)
            }
            ActionKind::Create => Err(ReconcileError::InvalidAction(
                "create user (user creation is disabled)".to_string(),
            )),
            ActionKind::Update => Err(ReconcileError::InvalidAction(format!(
                "{} user",
                action.kind
            ))),
        }
    }

    /// Execute against the client registered for `action.target`
    pub async fn execute_in(
        &self,
        action: &Action<UserBinding>,
        map: &ClusterMap,
    ) -> Result<ExecOutcome> {
        let client = map.client_for(&action.target)?;
        self.execute(action, client.as_ref()).await
    }
}
