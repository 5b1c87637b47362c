use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strata_core::QueueTree;
use strata_scheduler::{
    HttpClusterClient, Kubeconfig, QueueReconciler, ReconcilerConfig, Scheduler, SchedulerConfig,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Hierarchical capacity-share scheduler for Kubernetes"
)]
struct Cli {
    /// Path to the kubeconfig file (default: ~/.kube/config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Seconds between scheduling poll cycles
    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,

    /// Scheduler name pods must request via spec.schedulerName
    #[arg(long, default_value = "kubescheduler")]
    scheduler_name: String,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting strata scheduler");

    let kubeconfig = match &cli.kubeconfig {
        Some(path) => Kubeconfig::load(path),
        None => Kubeconfig::load_default(),
    }
    .map_err(|e| miette::miette!("Failed to load kubeconfig: {}", e))?;

    let credentials = kubeconfig
        .credentials()
        .map_err(|e| miette::miette!("Failed to resolve cluster credentials: {}", e))?;

    info!("Using cluster API server at {}", credentials.server);

    let client = Arc::new(
        HttpClusterClient::new(&credentials, &cli.scheduler_name)
            .map_err(|e| miette::miette!("Failed to build cluster client: {}", e))?,
    );

    let tree = Arc::new(RwLock::new(QueueTree::new()));
    let token = CancellationToken::new();

    let scheduler = Scheduler::new(
        tree.clone(),
        client.clone(),
        SchedulerConfig {
            poll_interval: Duration::from_secs(cli.poll_interval_secs),
        },
    );
    let scheduler_token = token.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_token).await {
            error!("Scheduler error: {}", e);
        }
    });

    let reconciler = QueueReconciler::new(tree, client, ReconcilerConfig::default());
    let reconciler_token = token.clone();
    let reconciler_handle = tokio::spawn(async move {
        if let Err(e) = reconciler.run(reconciler_token).await {
            error!("Queue reconciler error: {}", e);
        }
    });

    // Wait for shutdown signal (SIGINT or SIGTERM)
    let sig = shutdown_signal().await;
    info!("Received {}, shutting down gracefully...", sig);
    token.cancel();

    let shutdown_timeout = Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_timeout, async {
        let _ = tokio::join!(scheduler_handle, reconciler_handle);
    })
    .await;

    info!("Shutdown complete");

    Ok(())
}

/// Wait for either SIGINT (ctrl-c) or SIGTERM, returning which one fired.
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}
