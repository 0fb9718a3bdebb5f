//! Command-line interface and the `collect` command

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::collector::ResourceCollector;
use crate::config::{
    Credential, RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::fetcher::client::ServicesClient;
use crate::graph::MemorySink;
use crate::metrics::init_metrics;
use crate::pipeline::{GraphPipeline, PipelineReport, MAX_ZONE_CONCURRENCY};
use crate::shutdown::SharedShutdown;

use super::{CliError, ValidateCommand};

/// Parse and validate zone concurrency
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_ZONE_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_ZONE_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse and validate the backoff multiplier
fn parse_backoff_factor(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !value.is_finite() || value < 1.0 {
        return Err(format!("backoff factor must be a number >= 1, got {s}"));
    }
    Ok(value)
}

/// Cloudflare graph collector CLI
#[derive(Parser, Debug)]
#[command(name = "cloudflare-graph-collector")]
#[command(about = "Collect Cloudflare accounts, members, roles, zones and DNS records as a graph", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Cloudflare API token
    #[arg(long, global = true, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Attempts per request, first attempt included (default: 10, range: 1-50)
    #[arg(
        long,
        global = true,
        env = "CLOUDFLARE_MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..=50)
    )]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 200)
    #[arg(
        long,
        global = true,
        env = "CLOUDFLARE_INITIAL_DELAY_MS",
        default_value_t = DEFAULT_INITIAL_DELAY_MS,
        value_parser = clap::value_parser!(u64).range(0..=60_000)
    )]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt (default: 2, min: 1)
    #[arg(
        long,
        global = true,
        env = "CLOUDFLARE_BACKOFF_FACTOR",
        default_value_t = DEFAULT_BACKOFF_FACTOR,
        value_parser = parse_backoff_factor
    )]
    pub backoff_factor: f64,

    /// Disable randomization of retry delays
    #[arg(long, global = true, env = "CLOUDFLARE_NO_JITTER", default_value_t = false)]
    pub no_jitter: bool,

    /// Items requested per page (default: 500, range: 1-1000)
    #[arg(
        long,
        global = true,
        env = "CLOUDFLARE_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64)
    )]
    pub page_size: u32,

    /// Zones whose DNS records are fetched concurrently (default: 4, max: 32)
    ///
    /// Higher values finish large accounts faster but make rate limiting (429)
    /// more likely.
    #[arg(
        long,
        global = true,
        env = "CLOUDFLARE_ZONE_CONCURRENCY",
        default_value = "4",
        value_parser = parse_concurrency
    )]
    pub zone_concurrency: usize,

    /// Override the API root (testing against a mock server)
    #[arg(long, global = true, env = "CLOUDFLARE_API_BASE_URL", hide = true)]
    pub base_url: Option<String>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect the resource graph
    Collect(CollectArgs),

    /// Check that the API token is usable
    Validate(ValidateCommand),
}

impl Cli {
    /// Retry policy assembled from the global flags
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_factor: self.backoff_factor,
            jitter: !self.no_jitter,
        }
    }

    /// Credential from `--api-token` / `CLOUDFLARE_API_TOKEN`
    pub fn credential(&self) -> Result<Credential, CliError> {
        let token = self.api_token.as_deref().ok_or_else(|| {
            CliError::ConfigurationError(
                "missing API token: pass --api-token or set CLOUDFLARE_API_TOKEN".to_string(),
            )
        })?;
        Ok(Credential::new(token)?)
    }

    /// Collector configured from the global flags
    pub fn build_collector(&self, shutdown: SharedShutdown) -> Result<ResourceCollector, CliError> {
        let mut client = ServicesClient::new(self.credential()?)?
            .with_retry_policy(self.retry_policy())?
            .with_page_size(self.page_size)?
            .with_shutdown(shutdown);
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url.as_str());
        }
        Ok(ResourceCollector::new(client))
    }
}

/// Arguments of the `collect` command
#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Write the collected graph as JSON to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl CollectArgs {
    /// Run the pipeline and report what was collected
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_addr {
            init_metrics(addr).await.map_err(|e| {
                CliError::ConfigurationError(format!("failed to start metrics exporter: {e}"))
            })?;
        }

        let collector = cli.build_collector(shutdown)?;
        let sink = Arc::new(MemorySink::new());
        let pipeline =
            GraphPipeline::new(collector, sink.clone()).with_zone_concurrency(cli.zone_concurrency);

        info!(
            max_attempts = cli.max_attempts,
            page_size = cli.page_size,
            zone_concurrency = pipeline.zone_concurrency(),
            "Starting collection"
        );
        let report = pipeline.run().await?;
        print_summary(&report);

        if let Some(path) = &self.output {
            sink.write_json(path).await?;
            println!("Graph written to {}", path.display());
        }
        Ok(())
    }
}

fn print_summary(report: &PipelineReport) {
    println!("Collection complete");
    for step in &report.steps {
        println!(
            "  {}: {} entities, {} relationships, {} mapped relationships",
            step.id, step.entities, step.relationships, step.mapped_relationships
        );
    }
    println!(
        "  Total: {} entities, {} relationships",
        report.total_entities(),
        report.total_relationships()
    );

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}
