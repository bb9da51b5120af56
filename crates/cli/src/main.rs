//! kubectl-unmount
//!
//! A kubectl plugin that unmounts PersistentVolumes by scaling every
//! workload that mounts them down to zero, then waiting for the pods to go.

mod commands;
mod output;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::unmount::{self, UnmountArgs};
use output::LogFormat;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use unmount_lib::{ClusterApi, KubeCluster, VolumeFilter};

/// Unmount PersistentVolumes by scaling down the workloads that use them
#[derive(Parser, Debug)]
#[command(name = "kubectl-unmount")]
#[command(author, version, about = "Unmount PersistentVolumes by scaling down the workloads that use them", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Only unmount claims in this namespace (searches all namespaces if unset)
    #[arg(long, short = 'n', env = "UNMOUNT_NAMESPACE")]
    pub namespace: Option<String>,

    /// Unmount PVs of a specific storage class
    #[arg(long, short = 'c', env = "UNMOUNT_STORAGE_CLASS")]
    pub storage_class: Option<String>,

    /// Unmount a single PersistentVolumeClaim (requires --namespace)
    #[arg(long, env = "UNMOUNT_PVC")]
    pub pvc: Option<String>,

    /// Print summary of controllers that would be scaled down, but *don't* modify anything
    #[arg(long, short = 'd', env = "UNMOUNT_DRY_RUN")]
    pub dry_run: bool,

    /// Skip confirmation prompt and proceed with scaling down pods
    #[arg(long, short = 'y', env = "UNMOUNT_YES")]
    pub yes: bool,

    /// Path to kubeconfig file (uses default loading rules if not specified)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Seconds between checks while waiting for pods to stop
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval: Option<u64>,

    /// Give up waiting for pods after this many seconds (0 waits forever)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Log format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,
}

impl Cli {
    fn volume_filter(&self) -> VolumeFilter {
        VolumeFilter {
            namespace: self.namespace.clone(),
            storage_class: self.storage_class.clone(),
            claim_name: self.pvc.clone(),
        }
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .without_time()
                    .with_target(false),
            )
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("kubectl-unmount {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_tracing(cli.verbose, cli.log_format);

    // Reject bad flag combinations before touching the cluster
    let filter = cli.volume_filter();
    filter.validate()?;

    let settings = settings::Settings::load()?;
    let args = UnmountArgs {
        filter,
        dry_run: cli.dry_run,
        assume_yes: cli.yes,
        wait: settings.wait_options(cli.poll_interval, cli.timeout),
    };

    let client = settings::kube_client(cli.kubeconfig.as_deref(), cli.context.as_deref()).await?;
    let cluster: Arc<dyn ClusterApi> = Arc::new(KubeCluster::new(client));

    unmount::run(cluster, &args, &mut io::stdout(), &mut io::stdin().lock()).await
}
