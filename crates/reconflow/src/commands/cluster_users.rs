use crate::commands::{finish, worker_pool};
use crate::slack;
use colored::Colorize;
use reconflow_cluster::{ClusterUsersIntegration, OcFactory, UsersOptions};
use reconflow_config::Settings;
use reconflow_core::{ActionKind, EnvSecretReader, ErrorRegistry, FileStateSource, Selector};
use std::process::ExitCode;
use std::sync::Arc;

pub struct ClusterUsersArgs {
    pub create_users: bool,
    pub thread_pool_size: Option<usize>,
    pub clusters: Vec<String>,
}

pub async fn handle(
    settings: &Settings,
    dry_run: bool,
    args: ClusterUsersArgs,
) -> anyhow::Result<ExitCode> {
    println!("{}", "Reconciling cluster users...".blue().bold());
    if dry_run {
        println!("{}", "(dry run)".dimmed());
    }

    let integration = ClusterUsersIntegration {
        source: Arc::new(FileStateSource::new(&settings.source.path)),
        secrets: Arc::new(EnvSecretReader),
        factory: Arc::new(OcFactory::new(settings.cluster_users.oc_binary.clone())),
        notifier: slack::notifier(settings.slack.as_ref()),
    };

    let selector = args
        .clusters
        .iter()
        .fold(Selector::all(), |s, cluster| s.with_cluster(cluster));

    let options = UsersOptions {
        dry_run,
        create_users: args.create_users || settings.cluster_users.create_users,
        pool: worker_pool(settings, args.thread_pool_size),
        selector,
        channel: settings.slack.as_ref().map(|s| s.channel.clone()),
        output: settings.slack.as_ref().and_then(|s| s.output.clone()),
    };

    let errors = ErrorRegistry::new();
    let report = integration.run(&options, &errors).await?;

    if !report.actions.is_empty() {
        println!();
        println!("{}", "Actions:".bold());
        for action in &report.actions {
            let kind = match action.kind {
                ActionKind::Create => action.kind.to_string().green(),
                ActionKind::Update => action.kind.to_string().yellow(),
                ActionKind::Delete => action.kind.to_string().red(),
            };
            println!(
                "  [{}] {} {}",
                action.target.cyan(),
                kind,
                action.subject.user
            );
        }
        println!("  {} {}", "Total:".bold(), report.summary());
    }

    Ok(finish(&report.outcome, &errors))
}
