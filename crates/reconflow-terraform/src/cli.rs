//! terraform CLI wrapper

use crate::error::{Result, TerraformError};
use reconflow_core::DeltaSummary;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Saved plan file inside each working directory
pub const PLAN_FILE: &str = "tfplan";

/// terraform CLI wrapper
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: PathBuf,
}

impl Default for Terraform {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl Terraform {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run a terraform command in `dir` and return stdout
    async fn run_command(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.current_dir(dir);
        cmd.env("TF_IN_AUTOMATION", "1");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            "Running: {} {} (in {})",
            self.binary.display(),
            args.join(" "),
            dir.display()
        );

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                TerraformError::BinaryNotFound(self.binary.display().to_string())
            }
            _ => TerraformError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TerraformError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub async fn init(&self, dir: &Path) -> Result<()> {
        self.run_command(dir, &["init", "-input=false", "-no-color"])
            .await?;
        Ok(())
    }

    /// Plan into [`PLAN_FILE`] and summarize the planned changes
    pub async fn plan(&self, dir: &Path) -> Result<DeltaSummary> {
        self.run_command(
            dir,
            &["plan", "-input=false", "-no-color", "-out", PLAN_FILE],
        )
        .await?;
        let json = self.run_command(dir, &["show", "-json", PLAN_FILE]).await?;
        parse_plan(&json)
    }

    /// Apply the saved plan
    pub async fn apply(&self, dir: &Path) -> Result<()> {
        self.run_command(
            dir,
            &["apply", "-input=false", "-no-color", "-auto-approve", PLAN_FILE],
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct PlanJson {
    #[serde(default)]
    resource_changes: Vec<ResourceChange>,
}

#[derive(Debug, Deserialize)]
struct ResourceChange {
    address: String,
    change: Change,
}

#[derive(Debug, Deserialize)]
struct Change {
    actions: Vec<String>,
}

/// Summarize `terraform show -json` output
///
/// A replacement counts as both a create and a delete.
pub fn parse_plan(json: &str) -> Result<DeltaSummary> {
    let plan: PlanJson = serde_json::from_str(json)?;
    let mut delta = DeltaSummary::default();

    for rc in plan.resource_changes {
        for action in &rc.change.actions {
            match action.as_str() {
                "create" => delta.create.push(rc.address.clone()),
                "update" => delta.update.push(rc.address.clone()),
                "delete" => delta.delete.push(rc.address.clone()),
                "no-op" | "read" => {}
                other => {
                    return Err(TerraformError::InvalidPlan(format!(
                        "unknown action '{}' for {}",
                        other, rc.address
                    )));
                }
            }
        }
    }

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan() {
        let json = r#"{
            "format_version": "1.2",
            "resource_changes": [
                {"address": "cloudflare_zone.example-com", "change": {"actions": ["no-op"]}},
                {"address": "cloudflare_record.www", "change": {"actions": ["create"]}},
                {"address": "cloudflare_record.api", "change": {"actions": ["update"]}},
                {"address": "cloudflare_record.old", "change": {"actions": ["delete"]}},
                {"address": "cloudflare_worker_route.hello", "change": {"actions": ["delete", "create"]}}
            ]
        }"#;

        let delta = parse_plan(json).unwrap();
        assert_eq!(
            delta.create,
            vec!["cloudflare_record.www", "cloudflare_worker_route.hello"]
        );
        assert_eq!(delta.update, vec!["cloudflare_record.api"]);
        assert_eq!(
            delta.delete,
            vec!["cloudflare_record.old", "cloudflare_worker_route.hello"]
        );
    }

    #[test]
    fn test_parse_empty_plan() {
        let delta = parse_plan(r#"{"format_version": "1.2"}"#).unwrap();
        assert!(!delta.has_changes());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let json = r#"{"resource_changes": [{"address": "x.y", "change": {"actions": ["explode"]}}]}"#;
        assert!(matches!(
            parse_plan(json).unwrap_err(),
            TerraformError::InvalidPlan(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let terraform = Terraform::new("/nonexistent/terraform");
        let err = terraform.init(dir.path()).await.unwrap_err();
        assert!(matches!(err, TerraformError::BinaryNotFound(_)));
    }

    /// An abandoned call takes its terraform process down with it
    #[cfg(unix)]
    #[tokio::test]
    async fn test_abandoned_command_is_killed() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let bin = tempfile::tempdir().unwrap();
        let script = bin.path().join("terraform");
        std::fs::write(&script, "#!/bin/sh\nsleep 2\ntouch finished\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let terraform = Terraform::new(script.clone());
        let abandoned =
            tokio::time::timeout(Duration::from_millis(300), terraform.init(dir.path())).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("finished").exists());
    }
}
