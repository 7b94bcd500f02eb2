use anyhow::Context;
use clap::Parser;
use snapqueue::{
    seed_from_file, setup_logging, CaptureEngine, Capturer, Cli, Config, Dispatcher, JobExecutor,
    MemoryStore, Metrics, Store,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Setup logging
    setup_logging(args.verbose).map_err(|e| anyhow::anyhow!("logging setup failed: {e}"))?;

    info!("Starting snapqueue v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&args).await?;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let metrics = Arc::new(Metrics::new());

    // Seed the queue from an input file, if given
    if let Some(input) = &args.input {
        let count = seed_from_file(store.as_ref(), input).await?;
        info!(count, "enqueued capture jobs from {}", input.display());
    }

    let capturer: Arc<dyn Capturer> = Arc::new(CaptureEngine::new(config.clone()));
    let executor = Arc::new(JobExecutor::new(
        store.clone(),
        capturer,
        config.clone(),
        metrics.clone(),
    ));
    let dispatcher = Dispatcher::new(store.clone(), executor, config.clone(), metrics);

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let _shutdown_handler = setup_shutdown_handler(shutdown_tx);

    // Poll until a termination signal arrives, then drain in-flight jobs
    dispatcher.run(shutdown_rx).await;

    // Store connection released on drop
    drop(store);
    info!("snapqueue stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        // Load from file
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("failed to read config file {}", config_path.display()))?;
        serde_json::from_str(&config_content).context("failed to parse config file")?
    } else {
        // Use default configuration
        Config::default()
    };

    // Override with CLI arguments
    if let Some(poll_interval) = args.poll_interval {
        config.poll_interval = Duration::from_secs(poll_interval);
    }
    if let Some(max_concurrent) = args.max_concurrent {
        config.max_concurrent = max_concurrent;
    }
    if let Some(retry_limit) = args.retry_limit {
        config.retry_limit = retry_limit;
    }
    if let Some(output) = &args.output {
        config.output_root = output.clone();
    }
    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    // Validate configuration
    config.validate().context("invalid configuration")?;

    info!("Configuration loaded successfully");
    info!("Poll interval: {:?}", config.poll_interval);
    info!("Max concurrent jobs: {}", config.max_concurrent);
    info!("Retry limit: {}", config.retry_limit);

    Ok(config)
}

fn setup_shutdown_handler(
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to create SIGINT handler");
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to create SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        let _ = shutdown_tx.send(());
    })
}
