//! Cloudflare resources reconciliation run
//!
//! fetch → build specs → register per account → render → plan → gate → apply

use crate::account::build_client;
use crate::builder::{BuildOutput, SpecBuilder};
use reconflow_core::{
    ApplyReport, ClientRegistry, ConfigRenderer, ContentStore, DesiredRecord, ErrorRegistry,
    PlanApplyDriver, PlanReport, ProviderClient, ReconcileError, ResourceGraph, Result,
    RunOutcome, SecretReader, Selector, StateSource, WorkerPool,
};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Default state-key prefix
pub const DEFAULT_INTEGRATION: &str = "terraform_resources_cloudflare";

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub enable_deletion: bool,
    /// Write artifacts here and stop before planning
    pub print_to_file: Option<PathBuf>,
    pub integration: String,
    pub pool: WorkerPool,
    pub selector: Selector,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            enable_deletion: false,
            print_to_file: None,
            integration: DEFAULT_INTEGRATION.to_string(),
            pool: WorkerPool::default(),
            selector: Selector::all(),
        }
    }
}

/// What a run did
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub plan: Option<PlanReport>,
    pub apply: Option<ApplyReport>,
}

impl RunReport {
    fn outcome(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            plan: None,
            apply: None,
        }
    }
}

/// Collaborators for one Cloudflare reconciliation
#[derive(Clone)]
pub struct CloudflareIntegration {
    pub source: Arc<dyn StateSource>,
    pub secrets: Arc<dyn SecretReader>,
    /// Absent when no content store could be built
    pub content: Option<Arc<dyn ContentStore>>,
    pub renderer: Arc<dyn ConfigRenderer>,
    pub provider: Arc<dyn ProviderClient>,
}

fn provider_records(records: Vec<DesiredRecord>) -> Vec<DesiredRecord> {
    records
        .into_iter()
        .filter(|r| !matches!(r, DesiredRecord::UserBinding(_)))
        .collect()
}

impl CloudflareIntegration {
    /// One full reconciliation cycle
    ///
    /// Unit failures land in `errors`; only source queries and artifact
    /// writes fail the whole call.
    pub async fn run(&self, options: &RunOptions, errors: &ErrorRegistry) -> Result<RunReport> {
        let desired = provider_records(self.source.fetch_desired(&options.selector).await?);
        if desired.is_empty() {
            error!("No Cloudflare zones, records or workers declared");
            return Ok(RunReport::outcome(RunOutcome::NoDesiredRecords));
        }

        let accounts = self.source.cloudflare_accounts(&options.selector).await?;
        if accounts.is_empty() {
            error!("No Cloudflare accounts declared");
            return Ok(RunReport::outcome(RunOutcome::NoTargets));
        }

        let mut registry = ClientRegistry::new();
        let mut skipped: HashSet<String> = HashSet::new();
        for account in &accounts {
            match build_client(&options.integration, account, self.secrets.as_ref()) {
                Ok(client) => registry.register(client),
                Err(e) => {
                    errors.register(account.name.as_str(), &e);
                    skipped.insert(account.name.clone());
                }
            }
        }

        let BuildOutput { specs, failures } =
            SpecBuilder::new(self.content.clone())
                .with_call_timeout(options.pool.call_timeout())
                .build(&desired)
                .await;
        for failure in failures {
            errors.register(failure.account.as_str(), &failure.error);
            if registry.abandon(&failure.account).is_some() {
                skipped.insert(failure.account);
            }
        }

        for spec in specs {
            let account = spec.account.clone();
            if skipped.contains(&account) {
                continue;
            }
            if let Err(e) = registry.add_spec(spec) {
                errors.register(account.as_str(), &e);
                registry.abandon(&account);
                skipped.insert(account);
            }
        }

        for (account, e) in registry.populate_resources(self.renderer.as_ref()) {
            errors.register(account.as_str(), &e);
        }

        if registry.is_empty() {
            error!("No Cloudflare account could be prepared");
            return Ok(RunReport::outcome(RunOutcome::from_registry(
                errors,
                RunOutcome::NoTargets,
            )));
        }

        let workdirs = registry.dump(options.print_to_file.as_deref())?;
        if options.print_to_file.is_some() {
            drop(workdirs);
            return Ok(RunReport::outcome(RunOutcome::from_registry(
                errors,
                RunOutcome::PrintOnly,
            )));
        }

        let mut driver = PlanApplyDriver::new(
            self.provider.clone(),
            workdirs,
            options.pool.clone(),
            errors.clone(),
        );

        let plan = driver.plan(options.enable_deletion).await?.clone();
        let report = if plan.disabled_deletions_detected() {
            RunReport {
                outcome: RunOutcome::DisabledDeletions,
                plan: Some(plan),
                apply: None,
            }
        } else if !plan.is_clean() {
            warn!("{} account(s) failed to plan", plan.failed.len());
            RunReport {
                outcome: RunOutcome::from_registry(errors, RunOutcome::finished(options.dry_run)),
                plan: Some(plan),
                apply: None,
            }
        } else if options.dry_run {
            info!("Dry run: {}", plan.total());
            RunReport {
                outcome: RunOutcome::from_registry(errors, RunOutcome::DryRunCompleted),
                plan: Some(plan),
                apply: None,
            }
        } else {
            let applied = driver.apply().await?;
            RunReport {
                outcome: RunOutcome::from_registry(errors, RunOutcome::Completed),
                plan: Some(plan),
                apply: Some(applied),
            }
        };

        driver.cleanup();
        Ok(report)
    }
}

/// Check declared Cloudflare state without touching any platform
///
/// Returns every problem found, keyed by account.
pub async fn validate(
    source: &dyn StateSource,
    selector: &Selector,
) -> Result<Vec<(String, ReconcileError)>> {
    let desired = provider_records(source.fetch_desired(selector).await?);
    let accounts = source.cloudflare_accounts(selector).await?;

    let mut graphs: BTreeMap<String, ResourceGraph> = accounts
        .iter()
        .map(|a| (a.name.clone(), ResourceGraph::new(a.name.clone())))
        .collect();

    let output = SpecBuilder::offline().build(&desired).await;
    let mut problems: Vec<(String, ReconcileError)> = output
        .failures
        .into_iter()
        .map(|f| (f.account, f.error))
        .collect();

    for spec in output.specs {
        let account = spec.account.clone();
        let inserted = match graphs.get_mut(&account) {
            Some(graph) => graph.insert(spec),
            None => Err(ReconcileError::UnknownAccount(account.clone())),
        };
        if let Err(e) = inserted {
            problems.push((account, e));
        }
    }

    for (account, graph) in &graphs {
        if let Err(e) = graph.topological_order() {
            problems.push((account.clone(), e));
        }
    }

    Ok(problems)
}
