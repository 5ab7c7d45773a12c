use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sparkgate::backlog::SqsBacklog;
use sparkgate::cluster::KubeClient;
use sparkgate::config::{BacklogConfig, NamespaceSelection, SchedulerConfig, FALLBACK_NAMESPACES};
use sparkgate::monitor;
use sparkgate::scheduler::{Scheduler, SparkSubmitter};
use sparkgate::server;
use sparkgate::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "sparkgate")]
#[command(version)]
#[command(about = "Admission-controlled Spark job scheduler")]
struct Args {
    /// URL of the SQS job queue
    #[arg(long, env = "SQS_QUEUE_URL")]
    queue_url: String,

    /// URL of the dead-letter queue (observed for depth only)
    #[arg(long, env = "SQS_DLQ_URL")]
    dlq_url: Option<String>,

    /// AWS region for the SQS client
    #[arg(long, env = "AWS_REGION", default_value = "us-west-2")]
    region: String,

    /// Maximum messages pulled per backlog poll
    #[arg(long, env = "JOB_SCHEDULER_BATCH_SIZE", default_value = "10")]
    batch_size: u32,

    /// Minimum seconds between backlog polls
    #[arg(long, env = "JOB_SCHEDULER_POLL_INTERVAL", default_value = "5")]
    poll_interval: u64,

    /// Seconds between pending-driver checks (the loop tick)
    #[arg(long, env = "DRIVER_CHECK_INTERVAL", default_value = "1")]
    driver_check_interval: u64,

    /// Explicit comma-separated namespace list; disables discovery
    #[arg(long, env = "SPARK_JOB_NAMESPACES", value_delimiter = ',')]
    namespaces: Vec<String>,

    /// Prefix for namespace discovery when no explicit list is given
    #[arg(long, env = "SPARK_JOB_NAMESPACE_PREFIX", default_value = "spark-job")]
    namespace_prefix: String,

    /// Port for the /metrics and /healthz server
    #[arg(long, env = "METRICS_PORT", default_value = "8080")]
    metrics_port: u16,

    /// Seconds between background metrics refreshes
    #[arg(long, env = "METRICS_UPDATE_INTERVAL", default_value = "30")]
    metrics_update_interval: u64,

    /// Consecutive tick failures before health reports unhealthy
    #[arg(long, default_value = "5")]
    max_consecutive_errors: u32,
}

/// Resolve the namespace list: explicit config wins; otherwise discover by
/// prefix, falling back to the static defaults when discovery fails or
/// matches nothing.
async fn resolve_namespaces(kube: &KubeClient, selection: &NamespaceSelection) -> Vec<String> {
    match selection {
        NamespaceSelection::Explicit(list) => list.clone(),
        NamespaceSelection::DiscoverByPrefix(prefix) => {
            match kube.discover_namespaces(prefix).await {
                Ok(discovered) if !discovered.is_empty() => {
                    tracing::info!(namespaces = ?discovered, "Discovered Spark job namespaces");
                    discovered
                }
                Ok(_) => {
                    tracing::warn!(prefix = %prefix, "No namespaces matched, using fallback list");
                    FALLBACK_NAMESPACES.iter().map(|s| s.to_string()).collect()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Namespace discovery failed, using fallback list");
                    FALLBACK_NAMESPACES.iter().map(|s| s.to_string()).collect()
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let namespaces = if args.namespaces.is_empty() {
        NamespaceSelection::DiscoverByPrefix(args.namespace_prefix.clone())
    } else {
        NamespaceSelection::Explicit(args.namespaces.clone())
    };

    let config = SchedulerConfig {
        batch_size: args.batch_size,
        poll_interval: Duration::from_secs(args.poll_interval),
        driver_check_interval: Duration::from_secs(args.driver_check_interval),
        max_consecutive_errors: args.max_consecutive_errors,
        namespaces,
        backlog: BacklogConfig {
            queue_url: args.queue_url,
            dlq_url: args.dlq_url,
            region: args.region,
            ..BacklogConfig::default()
        },
    };
    config.validate()?;

    let kube = Arc::new(KubeClient::in_cluster().await?);
    let namespaces = resolve_namespaces(&kube, &config.namespaces).await;
    let backlog = Arc::new(SqsBacklog::new(&config.backlog).await?);
    let submitter = SparkSubmitter::new(kube.clone());

    let (scheduler, health_rx) = Scheduler::new(
        config.clone(),
        namespaces.clone(),
        backlog.clone(),
        kube.clone(),
        submitter,
    );

    let token = install_shutdown_handler();

    let metrics_addr: SocketAddr = format!("0.0.0.0:{}", args.metrics_port).parse()?;
    let server_handle = tokio::spawn(server::run_server(
        metrics_addr,
        health_rx,
        token.clone(),
    ));

    let monitor_handle = tokio::spawn(monitor::run_monitor(
        backlog,
        kube,
        namespaces,
        Duration::from_secs(args.metrics_update_interval),
        token.clone(),
    ));

    scheduler.run(token).await;

    let _ = monitor_handle.await;
    let _ = server_handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
