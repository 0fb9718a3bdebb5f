//! Paginated, retrying access to the Cloudflare v4 API
//!
//! Layers, leaves first:
//! - [`transport`] - one HTTP request/response cycle, no retries
//! - [`classify`] - maps an attempt outcome to success, retry or abort
//! - [`client`] - bounded retry loop with exponential backoff and jitter
//! - [`pagination`] - lazy item stream across successive pages

use futures_util::Stream;
use std::pin::Pin;

pub mod classify;
pub mod client;
pub mod pagination;
pub mod retry_formatter;
pub mod transport;

pub use classify::{AttemptOutcome, ClassifiedError};
pub use client::ServicesClient;
pub use transport::{FailureHint, HttpRequest, RawResponse, ReqwestTransport, Transport, TransportFailure};

/// Fetcher errors surfaced to callers
///
/// Every variant that comes out of the retry loop names the endpoint and the
/// number of attempts that were consumed.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// A non-retryable failure ended the retry loop
    #[error("request to {endpoint} failed after {attempts} attempt(s): {source}")]
    Aborted {
        /// Request URL
        endpoint: String,
        /// Attempts consumed, including the failing one
        attempts: u32,
        /// Classification of the failure
        source: ClassifiedError,
    },

    /// Every allowed attempt hit a retryable failure
    #[error("API request to {endpoint} failed after {attempts} attempt(s), retries exhausted: {last}")]
    RetriesExhausted {
        /// Request URL
        endpoint: String,
        /// Attempts consumed
        attempts: u32,
        /// Classification of the last failure
        #[source]
        last: ClassifiedError,
    },

    /// Cancellation was requested while the request was pending
    #[error("request to {endpoint} cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Request URL
        endpoint: String,
        /// Attempts made before cancellation
        attempts: u32,
    },

    /// Pagination did not terminate within the page cap
    #[error("pagination of {endpoint} exceeded {max_pages} pages")]
    PageLimitExceeded {
        /// Endpoint path
        endpoint: String,
        /// Page cap that was hit
        max_pages: u32,
    },

    /// Invalid client configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FetcherError {
    /// Classification of the failure, when it came from a completed attempt.
    pub fn classification(&self) -> Option<&ClassifiedError> {
        match self {
            FetcherError::Aborted { source, .. } => Some(source),
            FetcherError::RetriesExhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    /// HTTP status of the failing attempt, if there was a response.
    pub fn status(&self) -> Option<u16> {
        self.classification().and_then(ClassifiedError::status)
    }

    /// Attempts consumed before the error was surfaced.
    pub fn attempts(&self) -> u32 {
        match self {
            FetcherError::Aborted { attempts, .. }
            | FetcherError::RetriesExhausted { attempts, .. }
            | FetcherError::Cancelled { attempts, .. } => *attempts,
            FetcherError::PageLimitExceeded { .. } | FetcherError::Configuration(_) => 0,
        }
    }

    /// Endpoint the error refers to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            FetcherError::Aborted { endpoint, .. }
            | FetcherError::RetriesExhausted { endpoint, .. }
            | FetcherError::Cancelled { endpoint, .. }
            | FetcherError::PageLimitExceeded { endpoint, .. } => Some(endpoint),
            FetcherError::Configuration(_) => None,
        }
    }

    /// The credential was rejected (401).
    pub fn is_authentication(&self) -> bool {
        matches!(
            self.classification(),
            Some(ClassifiedError::Authentication { .. })
        )
    }

    /// The credential lacks permission for this resource (403).
    pub fn is_authorization(&self) -> bool {
        matches!(
            self.classification(),
            Some(ClassifiedError::Authorization { .. })
        )
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Lazy, single-pass stream of items from a paginated endpoint
pub type ItemStream<'a, T> = Pin<Box<dyn Stream<Item = FetcherResult<T>> + Send + 'a>>;
