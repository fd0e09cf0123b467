//! Plan/apply driver
//!
//! Drives every account's working directory through
//! `Idle -> Planned -> (Applied | Aborted)`. Per-account failures are
//! registered and never unwind past the driver. Working directories are
//! released exactly once, either by [`PlanApplyDriver::cleanup`] or on drop.

use crate::action::ActionSummary;
use crate::error::{ReconcileError, Result};
use crate::error_registry::ErrorRegistry;
use crate::pool::WorkerPool;
use crate::registry::WorkingDir;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Resource addresses a provider would change, by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub create: Vec<String>,
    pub update: Vec<String>,
    pub delete: Vec<String>,
}

impl DeltaSummary {
    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            create: self.create.len(),
            update: self.update.len(),
            delete: self.delete.len(),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.summary().has_changes()
    }

    pub fn has_deletions(&self) -> bool {
        !self.delete.is_empty()
    }
}

impl std::fmt::Display for DeltaSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Provider-side plan/apply over a materialized working directory
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> &str;

    /// Delta the provider would apply for `account`
    async fn plan(&self, account: &str, dir: &Path) -> Result<DeltaSummary>;

    /// Execute the changes materialized in `dir`
    async fn apply(&self, account: &str, dir: &Path) -> Result<()>;

    /// Release provider-held resources before the directory is removed
    fn release(&self, _account: &str, _dir: &Path) {}
}

/// Driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Planned,
    Applied,
    Aborted,
}

/// Outcome of the plan phase
#[derive(Debug, Clone, Default)]
pub struct PlanReport {
    pub deltas: BTreeMap<String, DeltaSummary>,
    /// Accounts whose plan call failed
    pub failed: Vec<String>,
    /// Accounts with deletions while deletions are disabled
    pub disabled_deletions: BTreeMap<String, Vec<String>>,
}

impl PlanReport {
    pub fn disabled_deletions_detected(&self) -> bool {
        !self.disabled_deletions.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.disabled_deletions_detected()
    }

    /// Totals across every planned account
    pub fn total(&self) -> ActionSummary {
        self.deltas.values().fold(ActionSummary::default(), |acc, d| {
            let s = d.summary();
            ActionSummary {
                create: acc.create + s.create,
                update: acc.update + s.update,
                delete: acc.delete + s.delete,
            }
        })
    }
}

/// Outcome of the apply phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    /// Accounts skipped because their plan had no changes
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
}

pub struct PlanApplyDriver {
    provider: Arc<dyn ProviderClient>,
    pool: WorkerPool,
    errors: ErrorRegistry,
    workdirs: BTreeMap<String, WorkingDir>,
    state: DriverState,
    report: Option<PlanReport>,
}

impl PlanApplyDriver {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        workdirs: BTreeMap<String, WorkingDir>,
        pool: WorkerPool,
        errors: ErrorRegistry,
    ) -> Self {
        Self {
            provider,
            pool,
            errors,
            workdirs,
            state: DriverState::Idle,
            report: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn report(&self) -> Option<&PlanReport> {
        self.report.as_ref()
    }

    fn units(&self, accounts: impl Fn(&str) -> bool) -> Vec<(String, (String, PathBuf))> {
        self.workdirs
            .iter()
            .filter(|(name, _)| accounts(name.as_str()))
            .map(|(name, dir)| (name.clone(), (name.clone(), dir.path().to_path_buf())))
            .collect()
    }

    /// Compute each account's delta and apply the disabled-deletion gate
    ///
    /// Nothing is mutated. A triggered gate moves the driver to `Aborted`.
    pub async fn plan(&mut self, allow_deletions: bool) -> Result<&PlanReport> {
        if self.state != DriverState::Idle {
            return Err(ReconcileError::InvalidState(format!(
                "plan requires Idle, driver is {:?}",
                self.state
            )));
        }

        let provider = self.provider.clone();
        let units = self.units(|_| true);
        let results = self
            .pool
            .run(units, |(account, dir)| {
                let provider = provider.clone();
                async move { provider.plan(&account, &dir).await }
            })
            .await;

        let mut report = PlanReport::default();
        for unit in results {
            match unit.result {
                Ok(delta) => {
                    info!(account = %unit.unit, "Plan: {}", delta);
                    if delta.has_deletions() && !allow_deletions {
                        for address in &delta.delete {
                            error!(
                                account = %unit.unit,
                                "'delete' action is not enabled for {}. Please run with --enable-deletion",
                                address
                            );
                        }
                        report
                            .disabled_deletions
                            .insert(unit.unit.clone(), delta.delete.clone());
                    }
                    report.deltas.insert(unit.unit, delta);
                }
                Err(e) => {
                    self.errors.register(unit.unit.as_str(), &e);
                    report.failed.push(unit.unit);
                }
            }
        }

        self.state = if report.disabled_deletions_detected() {
            warn!("Disabled deletions detected, aborting");
            DriverState::Aborted
        } else {
            DriverState::Planned
        };

        Ok(self.report.insert(report))
    }

    /// Apply every account with planned changes
    ///
    /// Only reachable after a clean plan. One account failing does not stop
    /// the others.
    pub async fn apply(&mut self) -> Result<ApplyReport> {
        let clean = self.report.as_ref().is_some_and(PlanReport::is_clean);
        if self.state != DriverState::Planned || !clean {
            return Err(ReconcileError::InvalidState(format!(
                "apply requires a clean plan, driver is {:?}",
                self.state
            )));
        }

        let deltas = self
            .report
            .as_ref()
            .map(|r| r.deltas.clone())
            .unwrap_or_default();
        let changed = |account: &str| deltas.get(account).is_some_and(DeltaSummary::has_changes);

        let mut report = ApplyReport {
            unchanged: self
                .workdirs
                .keys()
                .filter(|name| !changed(name.as_str()))
                .cloned()
                .collect(),
            ..Default::default()
        };

        let provider = self.provider.clone();
        let units = self.units(changed);
        let results = self
            .pool
            .run(units, |(account, dir)| {
                let provider = provider.clone();
                async move { provider.apply(&account, &dir).await }
            })
            .await;

        for unit in results {
            match unit.result {
                Ok(()) => {
                    info!(account = %unit.unit, "Applied");
                    report.applied.push(unit.unit);
                }
                Err(e) => {
                    self.errors.register(unit.unit.as_str(), &e);
                    report.failed.push(unit.unit);
                }
            }
        }

        self.state = DriverState::Applied;
        Ok(report)
    }

    /// Release every working directory; later calls are no-ops
    pub fn cleanup(&mut self) {
        for (account, dir) in std::mem::take(&mut self.workdirs) {
            self.provider.release(&account, dir.path());
            drop(dir);
        }
    }
}

impl Drop for PlanApplyDriver {
    fn drop(&mut self) {
        self.cleanup();
    }
}
