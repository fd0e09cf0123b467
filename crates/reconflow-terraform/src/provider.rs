//! ProviderClient backed by the terraform CLI

use crate::cli::{PLAN_FILE, Terraform};
use async_trait::async_trait;
use reconflow_core::{DeltaSummary, ProviderClient, Result};
use std::path::Path;
use tracing::{debug, info};

/// Plans and applies rendered working directories with terraform
#[derive(Debug, Clone, Default)]
pub struct TerraformProvider {
    terraform: Terraform,
}

impl TerraformProvider {
    pub fn new(terraform: Terraform) -> Self {
        Self { terraform }
    }
}

#[async_trait]
impl ProviderClient for TerraformProvider {
    fn name(&self) -> &str {
        "terraform"
    }

    async fn plan(&self, account: &str, dir: &Path) -> Result<DeltaSummary> {
        self.terraform
            .init(dir)
            .await
            .map_err(|e| e.into_backend(account))?;

        let delta = self
            .terraform
            .plan(dir)
            .await
            .map_err(|e| e.into_backend(account))?;

        for address in &delta.create {
            info!(account = %account, "[create] {}", address);
        }
        for address in &delta.update {
            info!(account = %account, "[update] {}", address);
        }
        for address in &delta.delete {
            info!(account = %account, "[delete] {}", address);
        }
        Ok(delta)
    }

    async fn apply(&self, account: &str, dir: &Path) -> Result<()> {
        self.terraform
            .apply(dir)
            .await
            .map_err(|e| e.into_execution(account))
    }

    fn release(&self, account: &str, dir: &Path) {
        // the saved plan embeds provider credentials
        let plan = dir.join(PLAN_FILE);
        if plan.exists() {
            match std::fs::remove_file(&plan) {
                Ok(()) => debug!(account = %account, "Removed saved plan"),
                Err(e) => debug!(account = %account, "Could not remove saved plan: {}", e),
            }
        }
    }
}
