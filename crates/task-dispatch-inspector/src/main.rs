use clap::Parser;
use std::sync::Arc;
use task_dispatch_inspector::{Inspector, InspectorConfig};
use task_dispatch_store::RedisStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "td-inspector")]
#[command(about = "Task dispatch health inspector", long_about = None)]
struct Args {
    /// Store URL
    #[arg(short, long, default_value = "redis://127.0.0.1:6379")]
    store_url: String,

    /// Logical queue name
    #[arg(short, long, default_value = "tasks")]
    queue: String,

    /// Seconds between reconciliation scans
    #[arg(long)]
    interval: Option<u64>,

    /// Seconds after which a silent worker counts as dead
    #[arg(long)]
    heartbeat_ttl: Option<u64>,

    /// Queue length above which a backlog warning is logged
    #[arg(long)]
    backlog_threshold: Option<u64>,

    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        InspectorConfig::from_file(config_path)?
    } else {
        InspectorConfig::default()
    };

    // Override with CLI args
    config.store_url = args.store_url;
    config.queue = args.queue;
    if let Some(interval) = args.interval {
        config.scan_interval_secs = interval;
    }
    if let Some(heartbeat_ttl) = args.heartbeat_ttl {
        config.heartbeat_ttl_secs = heartbeat_ttl;
    }
    if let Some(backlog_threshold) = args.backlog_threshold {
        config.backlog_threshold = backlog_threshold;
    }

    let store = RedisStore::connect(&config.store_url).await?;
    let inspector = Inspector::new(config, Arc::new(store));

    // Handle shutdown signals
    let handle = inspector.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        handle.shutdown();
    });

    inspector.run().await?;

    Ok(())
}
