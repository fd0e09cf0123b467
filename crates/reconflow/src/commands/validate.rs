use colored::Colorize;
use reconflow_config::Settings;
use reconflow_core::{FileStateSource, Selector};
use std::process::ExitCode;

pub async fn handle(settings: &Settings) -> anyhow::Result<ExitCode> {
    println!("{}", "Validating declared state...".blue());
    println!(
        "Source: {}",
        settings.source.path.display().to_string().cyan()
    );

    let source = FileStateSource::new(&settings.source.path);
    let state = source.load().await?;

    let bindings = state.user_bindings().len();
    println!();
    println!("Summary:");
    println!("  Clusters: {}", state.clusters.len());
    println!("  User bindings: {}", bindings);
    println!("  Cloudflare accounts: {}", state.cloudflare_accounts.len());
    println!("  Zones: {}", state.cloudflare_zones.len());
    println!("  Records: {}", state.cloudflare_records.len());
    println!("  Workers: {}", state.cloudflare_workers.len());

    let mut problems: Vec<(String, String)> =
        reconflow_cloudflare::validate(&source, &Selector::all())
            .await?
            .into_iter()
            .map(|(unit, e)| (unit, e.to_string()))
            .collect();

    for cluster in &state.clusters {
        if !cluster.unmanaged && cluster.automation_token.is_none() {
            problems.push((
                cluster.name.clone(),
                "managed cluster has no automation token".to_string(),
            ));
        }
    }

    println!();
    if problems.is_empty() {
        println!("{}", "✓ Declared state is valid".green().bold());
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!(
        "{}",
        format!("✗ {} problem(s) found", problems.len()).red().bold()
    );
    for (unit, message) in &problems {
        eprintln!("  {}: {}", unit.cyan(), message);
    }
    Ok(ExitCode::FAILURE)
}
