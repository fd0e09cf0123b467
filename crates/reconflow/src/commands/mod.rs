pub mod cloudflare;
pub mod cluster_users;
pub mod validate;

use colored::Colorize;
use reconflow_config::Settings;
use reconflow_core::{ErrorRegistry, RunOutcome, WorkerPool};
use std::process::ExitCode;

/// Worker pool from settings, with the CLI size taking precedence
pub fn worker_pool(settings: &Settings, thread_pool_size: Option<usize>) -> WorkerPool {
    let size = thread_pool_size.unwrap_or(settings.runtime.thread_pool_size);
    WorkerPool::new(size).with_timeout(settings.runtime.call_timeout())
}

/// Print registered errors and the run outcome, then map it to an exit code
pub fn finish(outcome: &RunOutcome, errors: &ErrorRegistry) -> ExitCode {
    let entries = errors.entries();
    if !entries.is_empty() {
        eprintln!();
        eprintln!("{}", format!("Errors ({}):", entries.len()).red().bold());
        for entry in &entries {
            eprintln!(
                "  {} [{}] {}: {}",
                "✗".red(),
                entry.kind,
                entry.unit.cyan(),
                entry.message
            );
        }
    }

    if outcome.is_success() {
        println!("{}", format!("✓ {}", outcome).green().bold());
    } else {
        eprintln!("{}", format!("✗ {}", outcome).red().bold());
    }

    ExitCode::from(outcome.exit_code())
}
