use clap::Parser;
use std::sync::Arc;
use task_dispatch_store::RedisStore;
use task_dispatch_worker::handler::{EchoHandler, SleepHandler};
use task_dispatch_worker::{Consumer, HandlerRegistry, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "td-worker")]
#[command(about = "Task dispatch worker", long_about = None)]
struct Args {
    /// Store URL
    #[arg(short, long, default_value = "redis://127.0.0.1:6379")]
    store_url: String,

    /// Logical queue name
    #[arg(short, long, default_value = "tasks")]
    queue: String,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,

    /// Attempts allowed per task before it is dropped
    #[arg(long)]
    max_attempts: Option<u32>,

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
        WorkerConfig::from_file(config_path)?
    } else {
        WorkerConfig::default()
    };

    // Override with CLI args
    config.store_url = args.store_url;
    config.queue = args.queue;
    if let Some(worker_id) = args.worker_id {
        config.worker_id = Some(worker_id);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }

    // Populate the handler registry
    let registry = HandlerRegistry::new();
    registry.register("debug.echo", EchoHandler);
    registry.register("debug.sleep", SleepHandler::new(1000));

    tracing::info!("Registered targets: {:?}", registry.targets());

    let store = RedisStore::connect(&config.store_url).await?;
    let consumer = Consumer::new(config, Arc::new(store), Arc::new(registry));

    // Handle shutdown signals
    let handle = consumer.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        handle.shutdown();
    });

    consumer.run().await?;

    Ok(())
}
