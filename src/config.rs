//! Client configuration: credential, retry policy and API constants

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::fetcher::{FetcherError, FetcherResult};

/// Base URL of the Cloudflare v4 API. Resource paths are appended verbatim.
pub const BASE_URL: &str = "https://api.cloudflare.com/client/v4/";

/// Page size used by every paginated endpoint unless overridden.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Largest page size the provider accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default number of attempts per logical fetch (initial attempt included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 200;

/// Default multiplier applied to the delay after each failed attempt.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Upper bound for a single backoff sleep, in milliseconds.
/// Ten attempts at factor 2 from 200ms would otherwise reach ~100s.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Fraction of the computed delay used as the jitter band (±25%).
pub const JITTER_FACTOR: f64 = 0.25;

/// Opaque bearer token used for every request.
///
/// The token never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting empty or whitespace-only values.
    pub fn new(token: impl Into<String>) -> FetcherResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(FetcherError::Configuration(
                "API token is required and must not be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Retry behaviour of the fetcher. Immutable once the client is built.
///
/// The delay before attempt `n + 1` is `initial_delay * backoff_factor^(n - 1)`,
/// clamped to [`MAX_BACKOFF_MS`] before jitter is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per logical fetch, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied per additional attempt
    pub backoff_factor: f64,
    /// Randomize each delay within ±[`JITTER_FACTOR`]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Check the policy invariants.
    pub fn validate(&self) -> FetcherResult<()> {
        if self.max_attempts == 0 {
            return Err(FetcherError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(FetcherError::Configuration(format!(
                "backoff_factor must be >= 1, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// Delay after the given failed attempt (1-based), before jitter.
    ///
    /// `initial_delay * backoff_factor^(attempt - 1)`, capped at [`MAX_BACKOFF_MS`].
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let delay_ms = delay_ms.min(MAX_BACKOFF_MS as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Delay actually slept after the given failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter {
            apply_jitter(delay)
        } else {
            delay
        }
    }
}

/// Spread a delay uniformly over `delay * (1 ± JITTER_FACTOR)`.
fn apply_jitter(delay: Duration) -> Duration {
    let delay_ms = delay.as_millis() as f64;
    let band = delay_ms * JITTER_FACTOR;
    if band < 1.0 {
        return delay;
    }
    let offset = rand::thread_rng().gen_range(-band..=band);
    Duration::from_millis((delay_ms + offset).max(0.0) as u64)
}
