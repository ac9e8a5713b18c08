//! Metagate - a SQL execution gateway for metadata stores.

use metagate::cli::{self, Cli};
use metagate::db;
use metagate::gateway::MetastoreGateway;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    let format = cli.output_format()?;
    let batch = cli.read_batch()?;

    // Build pool configuration with precedence:
    // 1. CLI arguments (highest)
    // 2. Config file
    // 3. Environment variables
    let config = cli.resolve_config()?;
    info!("Metastore: {}", config.display_string());

    let pool: Arc<dyn db::MetastorePool> = Arc::from(db::connect(&config)?);
    let gateway = MetastoreGateway::new(Arc::clone(&pool))
        .with_acquire_notifier(|diagnostic| eprintln!("{diagnostic}"));

    let outcome = gateway.process_batch(&batch, None).await;
    pool.shutdown().await;

    match outcome? {
        Some(result) => println!("{}", cli::render(&result, format)?),
        None => info!("Batch contained no query statement; nothing to render"),
    }

    Ok(())
}
