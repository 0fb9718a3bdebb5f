//! Single-attempt HTTP transport
//!
//! A [`Transport`] performs exactly one request/response cycle. It never retries;
//! failures carry a [`FailureHint`] that the classifier uses to decide whether the
//! condition is transient.

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use reqwest::{Client, Method};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::fetcher::{FetcherError, FetcherResult};

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout (seconds) - overall time for one attempt
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Longest body excerpt kept for error messages
const BODY_SNIPPET_LEN: usize = 200;

static SHARED_HTTP_CLIENT: OnceCell<Arc<Client>> = OnceCell::new();

/// Process-wide HTTP client so every collector shares one connection pool.
///
/// Built on first use with explicit connect and request timeouts; these
/// per-attempt timeouts are the only timeouts enforced anywhere in the crate.
pub fn shared_http_client() -> FetcherResult<Arc<Client>> {
    SHARED_HTTP_CLIENT
        .get_or_try_init(|| {
            Client::builder()
                .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
                .build()
                .map(Arc::new)
        })
        .cloned()
        .map_err(|e| {
            FetcherError::Configuration(format!(
                "failed to build HTTP client: {e}. Check system TLS configuration."
            ))
        })
}

/// One outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including query string
    pub url: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Optional request body
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// GET request without headers or body.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Completed response, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body bytes
    pub body: Bytes,
}

impl RawResponse {
    /// Response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, truncated for log and error messages.
    pub fn body_snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.chars().count() <= BODY_SNIPPET_LEN {
            return text.to_string();
        }
        let mut snippet: String = text.chars().take(BODY_SNIPPET_LEN).collect();
        snippet.push_str("...");
        snippet
    }
}

/// What kind of network failure prevented a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHint {
    /// Connection reset or aborted by the peer
    ConnectionReset,
    /// Attempt timed out
    Timeout,
    /// Connection could not be established (refused, DNS)
    Connect,
    /// Anything else
    Other,
}

impl fmt::Display for FailureHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureHint::ConnectionReset => "connection reset",
            FailureHint::Timeout => "timeout",
            FailureHint::Connect => "connection failed",
            FailureHint::Other => "network error",
        };
        write!(f, "{s}")
    }
}

/// Request that produced no response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{hint}: {message}")]
pub struct TransportFailure {
    /// Classification hint
    pub hint: FailureHint,
    /// Underlying error message
    pub message: String,
}

impl TransportFailure {
    /// Failure with an explicit hint.
    pub fn new(hint: FailureHint, message: impl Into<String>) -> Self {
        Self {
            hint,
            message: message.into(),
        }
    }

    /// Map a reqwest error, looking through its source chain for I/O resets.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let hint = if err.is_timeout() {
            FailureHint::Timeout
        } else if source_chain_has_reset(err) {
            FailureHint::ConnectionReset
        } else if err.is_connect() {
            FailureHint::Connect
        } else {
            FailureHint::Other
        };
        Self::new(hint, full_error_message(err))
    }
}

fn source_chain_has_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        if e.to_string().to_lowercase().contains("connection reset") {
            return true;
        }
        current = e.source();
    }
    false
}

fn full_error_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}

/// One HTTP request/response cycle
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request once.
    ///
    /// Any completed response is returned as [`RawResponse`], whatever its status.
    /// Only failures that prevented a response become [`TransportFailure`].
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportFailure> {
        (**self).send(request).await
    }
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Arc<Client>,
}

impl ReqwestTransport {
    /// Transport using the process-wide client.
    pub fn new() -> FetcherResult<Self> {
        Ok(Self::with_client(shared_http_client()?))
    }

    /// Transport using a caller-provided client.
    pub fn with_client(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportFailure> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportFailure::from_reqwest(&e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportFailure::from_reqwest(&e))?;

        Ok(RawResponse { status, body })
    }
}
