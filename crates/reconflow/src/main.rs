mod commands;
mod github;
mod logging;
mod slack;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::cloudflare::CloudflareArgs;
use commands::cluster_users::ClusterUsersArgs;
use logging::LogLevel;
use reconflow_config::Settings;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "recon")]
#[command(about = "Reconcile declared infrastructure state with live platforms", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./reconflow.yaml and friends)
    #[arg(short, long, global = true, env = "RECONFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Compute and print changes without applying them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Base log level; RUST_LOG overrides it
    #[arg(long, global = true, value_enum, ignore_case = true, default_value = "INFO")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile Cloudflare zones, DNS records and workers
    #[command(name = "cloudflare-resources")]
    CloudflareResources {
        /// Write each account's configuration under this directory and stop
        #[arg(long, value_name = "DIR")]
        print_to_file: Option<PathBuf>,
        /// Allow planned deletions to be applied
        #[arg(long)]
        enable_deletion: bool,
        /// Maximum accounts processed concurrently
        #[arg(long)]
        thread_pool_size: Option<usize>,
        /// Only reconcile these accounts (repeatable)
        #[arg(short, long = "account")]
        accounts: Vec<String>,
    },
    /// Reconcile users on managed clusters
    #[command(name = "cluster-users")]
    ClusterUsers {
        /// Also create declared users that are missing
        #[arg(long)]
        create_users: bool,
        /// Maximum clusters processed concurrently
        #[arg(long)]
        thread_pool_size: Option<usize>,
        /// Only reconcile these clusters (repeatable)
        #[arg(long = "cluster")]
        clusters: Vec<String>,
    },
    /// Check the declared state without contacting any platform
    Validate,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::CloudflareResources {
            print_to_file,
            enable_deletion,
            thread_pool_size,
            accounts,
        } => {
            let settings = load_settings(cli.config.as_deref())?;
            let args = CloudflareArgs {
                print_to_file,
                enable_deletion,
                thread_pool_size,
                accounts,
            };
            commands::cloudflare::handle(&settings, cli.dry_run, args).await
        }
        Commands::ClusterUsers {
            create_users,
            thread_pool_size,
            clusters,
        } => {
            let settings = load_settings(cli.config.as_deref())?;
            let args = ClusterUsersArgs {
                create_users,
                thread_pool_size,
                clusters,
            };
            commands::cluster_users::handle(&settings, cli.dry_run, args).await
        }
        Commands::Validate => {
            let settings = load_settings(cli.config.as_deref())?;
            commands::validate::handle(&settings).await
        }
        // No settings file needed
        Commands::Version => {
            println!("reconflow {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    let settings = reconflow_config::load(config)?;
    tracing::debug!(source = %settings.source.path.display(), "Settings loaded");
    Ok(settings)
}
