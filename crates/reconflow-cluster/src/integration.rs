//! Cluster users reconciliation run

use crate::client::ClientFactory;
use crate::map::ClusterMap;
use crate::users::{ActionExecutor, ExecOutcome, fetch_current};
use reconflow_core::{
    Action, ActionSummary, DesiredRecord, DiffPolicy, ErrorKind, ErrorRegistry, Notifier,
    Result, RunOutcome, SecretReader, Selector, StateSource, UserBinding, WorkerPool, diff,
    should_notify,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-run options
#[derive(Debug, Clone)]
pub struct UsersOptions {
    pub dry_run: bool,
    /// Also create users that are declared but missing
    pub create_users: bool,
    pub pool: WorkerPool,
    pub selector: Selector,
    /// Chat channel for per-event notifications
    pub channel: Option<String>,
    /// Output mode; notifications require "events"
    pub output: Option<String>,
}

impl Default for UsersOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            create_users: false,
            pool: WorkerPool::default(),
            selector: Selector::all(),
            channel: None,
            output: None,
        }
    }
}

/// What a run did
#[derive(Debug)]
pub struct UsersReport {
    pub outcome: RunOutcome,
    pub actions: Vec<Action<UserBinding>>,
    pub executed: Vec<(Action<UserBinding>, ExecOutcome)>,
}

impl UsersReport {
    fn outcome(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            actions: Vec::new(),
            executed: Vec::new(),
        }
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary::from_actions(&self.actions)
    }
}

/// Collaborators for one cluster users reconciliation
#[derive(Clone)]
pub struct ClusterUsersIntegration {
    pub source: Arc<dyn StateSource>,
    pub secrets: Arc<dyn SecretReader>,
    pub factory: Arc<dyn ClientFactory>,
    /// Absent when no notification backend could be built
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Notification line for one executed action
pub fn event_message(binding: &UserBinding, outcome: ExecOutcome) -> String {
    format!("[{}] User {} {}", binding.cluster, binding.user, outcome)
}

impl ClusterUsersIntegration {
    /// One full reconciliation cycle
    ///
    /// Unit failures land in `errors`. An invalid action aborts the run with
    /// `Err`, as do source query failures.
    pub async fn run(&self, options: &UsersOptions, errors: &ErrorRegistry) -> Result<UsersReport> {
        let desired: Vec<UserBinding> = self
            .source
            .fetch_desired(&options.selector)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                DesiredRecord::UserBinding(b) => Some(b),
                _ => None,
            })
            .collect();
        if desired.is_empty() {
            error!("No user bindings declared");
            return Ok(UsersReport::outcome(RunOutcome::NoDesiredRecords));
        }

        let clusters = self.source.clusters(&options.selector).await?;
        let map = ClusterMap::build(
            &clusters,
            self.secrets.as_ref(),
            self.factory.as_ref(),
            errors,
        );
        if map.is_empty() {
            error!("No managed cluster reachable");
            return Ok(UsersReport::outcome(RunOutcome::from_registry(
                errors,
                RunOutcome::NoTargets,
            )));
        }

        let current = fetch_current(&map, &options.pool, errors).await;
        for cluster in &current.unlisted {
            warn!(cluster = %cluster, "Skipping cluster with unknown users");
        }
        let desired: Vec<UserBinding> = desired
            .into_iter()
            .filter(|b| map.contains(&b.cluster) && current.is_known(&b.cluster))
            .collect();

        let policy = if options.create_users {
            DiffPolicy::full()
        } else {
            DiffPolicy::delete_only()
        };
        let actions = diff(&current.bindings, &desired, policy);

        for action in &actions {
            info!(
                cluster = %action.target,
                "[{}] {} user {}",
                action.target,
                action.kind,
                action.subject.user
            );
        }

        let mut report = UsersReport {
            outcome: RunOutcome::DryRunCompleted,
            actions,
            executed: Vec::new(),
        };

        if options.dry_run {
            report.outcome = RunOutcome::from_registry(errors, RunOutcome::DryRunCompleted);
            return Ok(report);
        }

        let executor = ActionExecutor::new(options.create_users);
        let units: Vec<(String, Action<UserBinding>)> = report
            .actions
            .iter()
            .map(|a| (a.target.clone(), a.clone()))
            .collect();
        let results = options
            .pool
            .run(units, |action| {
                let map = &map;
                async move {
                    let outcome = executor.execute_in(&action, map).await?;
                    Ok((action, outcome))
                }
            })
            .await;

        for unit in results {
            match unit.result {
                Ok(done) => report.executed.push(done),
                Err(e) if e.kind() == ErrorKind::Programmer => return Err(e),
                Err(e) => errors.register(unit.unit.as_str(), &e),
            }
        }

        self.notify(options, map.len(), &report.executed, errors).await;

        report.outcome = RunOutcome::from_registry(errors, RunOutcome::Completed);
        Ok(report)
    }

    async fn notify(
        &self,
        options: &UsersOptions,
        units_processed: usize,
        executed: &[(Action<UserBinding>, ExecOutcome)],
        errors: &ErrorRegistry,
    ) {
        if !should_notify(options.dry_run, units_processed, options.output.as_deref(), errors) {
            return;
        }
        let (Some(notifier), Some(channel)) = (&self.notifier, &options.channel) else {
            warn!("Notifications requested but no notifier is configured");
            return;
        };

        for (action, outcome) in executed {
            let text = event_message(&action.subject, *outcome);
            if let Err(e) = notifier.post_message(channel, &text).await {
                warn!("Failed to post notification: {}", e);
            }
        }
    }
}
