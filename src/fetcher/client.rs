//! Retrying client for the Cloudflare v4 API
//!
//! Every logical fetch runs through [`ServicesClient::fetch_page`], which makes
//! at most `max_attempts` attempts. Retryable failures back off exponentially
//! with optional jitter; anything else ends the fetch on the spot.

use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Credential, RetryPolicy, BASE_URL, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::fetcher::classify::{classify, AttemptOutcome};
use crate::fetcher::retry_formatter::RetryContext;
use crate::fetcher::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};
use crate::shutdown::SharedShutdown;
use crate::ApiResponse;

/// Authenticated client with a bounded retry loop
pub struct ServicesClient<T: Transport = ReqwestTransport> {
    transport: T,
    credential: Credential,
    base_url: String,
    retry_policy: RetryPolicy,
    page_size: u32,
    shutdown: Option<SharedShutdown>,
}

impl ServicesClient<ReqwestTransport> {
    /// Client using the process-wide HTTP connection pool and default settings.
    pub fn new(credential: Credential) -> FetcherResult<Self> {
        Ok(Self::with_transport(ReqwestTransport::new()?, credential))
    }
}

impl<T: Transport> ServicesClient<T> {
    /// Client over an explicit transport.
    pub fn with_transport(transport: T, credential: Credential) -> Self {
        Self {
            transport,
            credential,
            base_url: BASE_URL.to_string(),
            retry_policy: RetryPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            shutdown: None,
        }
    }

    /// Replace the retry policy after validating it.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> FetcherResult<Self> {
        policy.validate()?;
        self.retry_policy = policy;
        Ok(self)
    }

    /// Point the client at another API root. A trailing slash is added if missing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Items requested per page, between 1 and [`MAX_PAGE_SIZE`].
    pub fn with_page_size(mut self, page_size: u32) -> FetcherResult<Self> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(FetcherError::Configuration(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        self.page_size = page_size;
        Ok(self)
    }

    /// Stop retrying once the coordinator requests shutdown.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Active retry policy
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// API root every endpoint is resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Items requested per page
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Absolute URL of one page of an endpoint.
    pub fn page_url(&self, endpoint: &str, page: u32, per_page: u32) -> String {
        format!(
            "{}{}?page={page}&per_page={per_page}",
            self.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Fetch one page of a list endpoint, retrying transient failures.
    ///
    /// # Errors
    /// - [`FetcherError::Aborted`] on a non-retryable failure (401, 403, other 4xx,
    ///   undecodable body, connection refused)
    /// - [`FetcherError::RetriesExhausted`] when every attempt was retryable and failed
    /// - [`FetcherError::Cancelled`] when shutdown was requested
    pub async fn fetch_page<I>(
        &self,
        endpoint: &str,
        page: u32,
        per_page: u32,
    ) -> FetcherResult<ApiResponse<I>>
    where
        I: DeserializeOwned + Send,
    {
        let url = self.page_url(endpoint, page, per_page);
        self.get_with_retry(&url, metric_label(endpoint)).await
    }

    /// Bounded retry loop around a single GET
    async fn get_with_retry<R>(&self, url: &str, label: &str) -> FetcherResult<R>
    where
        R: DeserializeOwned + Send,
    {
        let max_attempts = self.retry_policy.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            if self.is_cancelled() {
                return Err(FetcherError::Cancelled {
                    endpoint: url.to_string(),
                    attempts: attempt,
                });
            }
            attempt += 1;

            debug!(url, attempt, max_attempts, "Sending request");
            let request = HttpRequest::get(url)
                .header("Authorization", self.credential.bearer_header())
                .header("Accept", "application/json");

            let request_metrics = HttpRequestMetrics::start(label, attempt);
            let outcome = self.transport.send(request).await;
            match &outcome {
                Ok(response) => request_metrics.record_complete(response.status),
                Err(failure) => request_metrics.record_network_error(failure.hint),
            }

            match classify::<R>(outcome) {
                AttemptOutcome::Success(body) => {
                    if attempt > 1 {
                        info!("{}", RetryContext::format_success(attempt, max_attempts, url));
                    }
                    return Ok(body);
                }
                AttemptOutcome::Abort(error) => {
                    let ctx = RetryContext::new(attempt, max_attempts, &error, Duration::ZERO, url);
                    error!("{}", ctx.format_failure());
                    return Err(FetcherError::Aborted {
                        endpoint: url.to_string(),
                        attempts: attempt,
                        source: error,
                    });
                }
                AttemptOutcome::Retry(error) if attempt >= max_attempts => {
                    let ctx = RetryContext::new(attempt, max_attempts, &error, Duration::ZERO, url);
                    error!("{}", ctx.format_failure());
                    return Err(FetcherError::RetriesExhausted {
                        endpoint: url.to_string(),
                        attempts: attempt,
                        last: error,
                    });
                }
                AttemptOutcome::Retry(error) => {
                    let backoff = self.retry_policy.delay_for_attempt(attempt);
                    let ctx = RetryContext::new(attempt, max_attempts, &error, backoff, url);
                    warn!("{}", ctx.format_retry());
                    record_retry_backoff(backoff, attempt);

                    if self.sleep_unless_cancelled(backoff).await {
                        return Err(FetcherError::Cancelled {
                            endpoint: url.to_string(),
                            attempts: attempt,
                        });
                    }
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|shutdown| shutdown.is_shutdown_requested())
    }

    /// Sleep for the backoff; returns `true` if shutdown interrupted it.
    async fn sleep_unless_cancelled(&self, backoff: Duration) -> bool {
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => false,
                    _ = shutdown.wait_for_shutdown() => {
                        info!("Shutdown requested, abandoning retry");
                        true
                    }
                }
            }
            None => {
                tokio::time::sleep(backoff).await;
                false
            }
        }
    }
}

/// Low-cardinality metric label: the last path segment (`members`, `dns_records`)
fn metric_label(endpoint: &str) -> &str {
    endpoint
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(endpoint)
}
