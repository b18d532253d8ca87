use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wizd::Config;
use wizd::Engine;

/// Poll WiZ bulbs on the local network and expose them as lights
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "wizd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("wizd starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let engine = Arc::new(Engine::new());
    engine.register_integrations_from_config(&config);

    let runner = engine.clone();
    let engine_task = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!("Engine stopped: {}", e);
        }
    });

    let (api_shutdown_tx, api_shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = config.api.clone().map(|api| {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = wizd::api::serve(engine, api.listen, api.port, api_shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        })
    });

    tracing::info!("Press Ctrl+C to exit");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    // No receiver when the API is disabled
    api_shutdown_tx.send(()).ok();
    if let Some(task) = api_task {
        if let Err(e) = task.await {
            tracing::error!("HTTP API task ended abnormally: {}", e);
        }
    }

    engine.shutdown().await;
    engine_task.abort();

    tracing::info!("wizd shutdown complete");

    Ok(())
}
