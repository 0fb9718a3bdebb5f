//! Main entry point for the cloudflare-graph-collector CLI

use clap::Parser;
use cloudflare_graph_collector::cli::{Cli, Commands};
use cloudflare_graph_collector::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cloudflare_graph_collector=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C stops retries and ends the run with a cancellation error
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping collection...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match cli.command {
        Commands::Collect(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Validate(ref cmd) => cmd
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
