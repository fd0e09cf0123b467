use crate::commands::{finish, worker_pool};
use crate::github;
use colored::Colorize;
use reconflow_cloudflare::{CloudflareIntegration, RunOptions, RunReport};
use reconflow_config::Settings;
use reconflow_core::{EnvSecretReader, ErrorRegistry, FileStateSource, Selector};
use reconflow_terraform::{Terraform, TerraformProvider, TerraformRenderer};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

pub struct CloudflareArgs {
    pub print_to_file: Option<PathBuf>,
    pub enable_deletion: bool,
    pub thread_pool_size: Option<usize>,
    pub accounts: Vec<String>,
}

pub async fn handle(
    settings: &Settings,
    dry_run: bool,
    args: CloudflareArgs,
) -> anyhow::Result<ExitCode> {
    println!("{}", "Reconciling Cloudflare resources...".blue().bold());
    if dry_run {
        println!("{}", "(dry run)".dimmed());
    }

    let terraform = Terraform::new(settings.cloudflare.terraform_binary.clone());
    let integration = CloudflareIntegration {
        source: Arc::new(FileStateSource::new(&settings.source.path)),
        secrets: Arc::new(EnvSecretReader),
        content: github::content_store(&settings.github, settings.runtime.call_timeout()),
        renderer: Arc::new(TerraformRenderer::new()),
        provider: Arc::new(TerraformProvider::new(terraform)),
    };

    let selector = args
        .accounts
        .iter()
        .fold(Selector::all(), |s, account| s.with_account(account));

    let options = RunOptions {
        dry_run,
        enable_deletion: args.enable_deletion || settings.cloudflare.enable_deletion,
        print_to_file: args.print_to_file,
        integration: settings.cloudflare.integration.clone(),
        pool: worker_pool(settings, args.thread_pool_size),
        selector,
    };

    let errors = ErrorRegistry::new();
    let report = integration.run(&options, &errors).await?;

    if let Some(dir) = &options.print_to_file {
        println!(
            "Configuration written to {}",
            dir.display().to_string().cyan()
        );
    }
    print_report(&report);

    Ok(finish(&report.outcome, &errors))
}

/// Per-account plan summary, then apply results
fn print_report(report: &RunReport) {
    let Some(plan) = &report.plan else {
        return;
    };

    println!();
    println!("{}", "Plan:".bold());
    for (account, delta) in &plan.deltas {
        let summary = delta.summary();
        let line = format!("  {}: {}", account, summary);
        if summary.has_changes() {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
    for account in &plan.failed {
        println!("  {}: {}", account, "plan failed".red());
    }
    for (account, addresses) in &plan.disabled_deletions {
        println!(
            "  {}: {}",
            account,
            "deletions planned but not enabled".red().bold()
        );
        for address in addresses {
            println!("    - {}", address);
        }
    }
    println!("  {} {}", "Total:".bold(), plan.total());

    if let Some(apply) = &report.apply {
        println!();
        println!("{}", "Apply:".bold());
        for account in &apply.applied {
            println!("  {} {}", "✓".green(), account);
        }
        for account in &apply.unchanged {
            println!("  {} {} (no changes)", "-".dimmed(), account);
        }
        for account in &apply.failed {
            println!("  {} {}", "✗".red(), account);
        }
    }
}
