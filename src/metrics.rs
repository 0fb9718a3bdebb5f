//! Observability metrics for the collector
//!
//! Counts HTTP attempts by endpoint and status, retries and their backoff, and
//! the entities and relationships handed to the sink.
//!
//! - Uses the `metrics` crate facade; without an installed recorder every call is a no-op
//! - [`init_metrics`] installs a Prometheus scrape endpoint when requested

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::fetcher::transport::FailureHint;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are no-ops once an exporter is installed.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP attempts made to the Cloudflare API"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP attempt duration in seconds"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_counter!(
        "graph_entities_emitted_total",
        Unit::Count,
        "Entities handed to the sink"
    );
    describe_counter!(
        "graph_relationships_emitted_total",
        Unit::Count,
        "Relationships handed to the sink"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and labels for one HTTP attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording a new HTTP attempt
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            start_time: Instant::now(),
            correlation_id: generate_correlation_id(),
            attempt,
        }
    }

    /// Record an attempt that produced a response
    pub fn record_complete(&self, status_code: u16) {
        self.record(status_code.to_string());
        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            attempt = self.attempt,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record an attempt that failed before a response
    pub fn record_network_error(&self, hint: FailureHint) {
        self.record("network_error".to_string());
        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            hint = %hint,
            "HTTP request failed without response"
        );
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn record(&self, status: String) {
        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status,
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(self.start_time.elapsed().as_secs_f64());
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "http_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());
}

/// Record an entity handed to the sink
pub fn record_entity(entity_type: &str) {
    counter!("graph_entities_emitted_total", "type" => entity_type.to_string()).increment(1);
}

/// Record a relationship handed to the sink
pub fn record_relationship(relationship_type: &str) {
    counter!("graph_relationships_emitted_total", "type" => relationship_type.to_string()).increment(1);
}
