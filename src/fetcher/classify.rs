//! Classification of attempt outcomes
//!
//! [`classify`] is a pure function: it inspects one completed attempt and says
//! whether the caller got a usable body, should try again, or must give up. It
//! never sleeps and never retries; that is the retry loop's job.

use serde::de::DeserializeOwned;

use crate::fetcher::transport::{FailureHint, RawResponse, TransportFailure};

/// Classified failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifiedError {
    /// Provider overload or rate limit (5xx, 429)
    #[error("retryable status {status}: {cause}")]
    Retryable {
        /// HTTP status
        status: u16,
        /// Reason phrase and body excerpt
        cause: String,
    },

    /// Credential missing or rejected (401)
    #[error("authentication failed (status {status})")]
    Authentication {
        /// HTTP status
        status: u16,
    },

    /// Credential lacks permission for this resource (403)
    #[error("authorization failed (status {status})")]
    Authorization {
        /// HTTP status
        status: u16,
    },

    /// Any other failure; never retried
    #[error("fatal error{}: {cause}", status_suffix(.status))]
    Fatal {
        /// HTTP status, absent for network failures and pre-response errors
        status: Option<u16>,
        /// Reason phrase, body excerpt or decode error
        cause: String,
    },

    /// Connection reset or timeout with no response
    #[error("transient network failure: {cause}")]
    TransientNetwork {
        /// Underlying network error
        cause: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl ClassifiedError {
    /// HTTP status, when the attempt got a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClassifiedError::Retryable { status, .. }
            | ClassifiedError::Authentication { status }
            | ClassifiedError::Authorization { status } => Some(*status),
            ClassifiedError::Fatal { status, .. } => *status,
            ClassifiedError::TransientNetwork { .. } => None,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifiedError::Retryable { .. } | ClassifiedError::TransientNetwork { .. }
        )
    }

    /// Short human description used in retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            ClassifiedError::Retryable { status: 429, .. } => "rate limit exceeded",
            ClassifiedError::Retryable { status, .. } => match status {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            ClassifiedError::Authentication { .. } => "authentication failed",
            ClassifiedError::Authorization { .. } => "permission denied",
            ClassifiedError::Fatal { status: Some(404), .. } => "resource not found",
            ClassifiedError::Fatal { status: Some(_), .. } => "request rejected",
            ClassifiedError::Fatal { status: None, .. } => "request failed",
            ClassifiedError::TransientNetwork { .. } => "network interruption",
        }
    }

    /// Suggested remediation presented after a final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            ClassifiedError::Retryable { status: 429, .. } => {
                "Reduce --zone-concurrency or raise --initial-delay-ms"
            }
            ClassifiedError::Retryable { .. } => {
                "Cloudflare may be experiencing issues, try again later"
            }
            ClassifiedError::Authentication { .. } => {
                "Verify the API token is correct and has not been revoked"
            }
            ClassifiedError::Authorization { .. } => {
                "Grant the API token read permission for this resource"
            }
            ClassifiedError::Fatal { .. } => "Review the request and the provider response body",
            ClassifiedError::TransientNetwork { .. } => {
                "Check network connectivity and try again"
            }
        }
    }
}

/// Result of one attempt, as seen by the retry loop
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// Usable, decoded body
    Success(T),
    /// Worth another attempt if the budget allows
    Retry(ClassifiedError),
    /// Stop now, whatever the remaining budget
    Abort(ClassifiedError),
}

impl<T> AttemptOutcome<T> {
    fn from_error(error: ClassifiedError) -> Self {
        if error.is_retryable() {
            AttemptOutcome::Retry(error)
        } else {
            AttemptOutcome::Abort(error)
        }
    }
}

/// Classify one attempt.
///
/// - status >= 500 or 429 → retry
/// - 401 → authentication, 403 → authorization, other non-2xx → fatal
/// - reset or timeout without a response → transient network, retry
/// - other transport failures → fatal
/// - 2xx that does not decode → fatal; a malformed body is not transient
pub fn classify<T: DeserializeOwned>(
    outcome: Result<RawResponse, TransportFailure>,
) -> AttemptOutcome<T> {
    let response = match outcome {
        Ok(response) => response,
        Err(failure) => return AttemptOutcome::from_error(classify_failure(failure)),
    };

    if response.is_success() {
        return match serde_json::from_slice::<T>(&response.body) {
            Ok(body) => AttemptOutcome::Success(body),
            Err(e) => AttemptOutcome::Abort(ClassifiedError::Fatal {
                status: Some(response.status),
                cause: format!("failed to decode response body: {e}"),
            }),
        };
    }

    AttemptOutcome::from_error(classify_status(&response))
}

fn classify_failure(failure: TransportFailure) -> ClassifiedError {
    match failure.hint {
        FailureHint::ConnectionReset | FailureHint::Timeout => ClassifiedError::TransientNetwork {
            cause: failure.to_string(),
        },
        FailureHint::Connect | FailureHint::Other => ClassifiedError::Fatal {
            status: None,
            cause: failure.to_string(),
        },
    }
}

fn classify_status(response: &RawResponse) -> ClassifiedError {
    let status = response.status;
    match status {
        401 => ClassifiedError::Authentication { status },
        403 => ClassifiedError::Authorization { status },
        429 => ClassifiedError::Retryable {
            status,
            cause: failure_cause(response),
        },
        s if s >= 500 => ClassifiedError::Retryable {
            status,
            cause: failure_cause(response),
        },
        _ => ClassifiedError::Fatal {
            status: Some(status),
            cause: failure_cause(response),
        },
    }
}

fn failure_cause(response: &RawResponse) -> String {
    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status");
    let body = response.body_snippet();
    if body.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}: {body}")
    }
}
