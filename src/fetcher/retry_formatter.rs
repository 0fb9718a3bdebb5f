//! Retry message formatting for the retrying client.
//!
//! Keeps retry, recovery and final-failure log lines consistent so operators can
//! grep for them, and attaches remediation hints to final failures.

use std::time::Duration;

use crate::fetcher::classify::ClassifiedError;

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext<'a> {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Classification of the failure that triggered the message
    pub error: &'a ClassifiedError,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// URL that failed
    pub endpoint: &'a str,
}

impl<'a> RetryContext<'a> {
    /// Convenience constructor used throughout the retry logic.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error: &'a ClassifiedError,
        backoff_duration: Duration,
        endpoint: &'a str,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error,
            backoff_duration,
            endpoint,
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt + 1,
            self.max_attempts,
            self.error.description(),
            self.backoff_duration.as_secs_f64(),
            self.endpoint
        )
    }

    /// Format retry success message when a previous attempt eventually works.
    pub fn format_success(attempt: u32, max_attempts: u32, endpoint: &str) -> String {
        format!("Retry attempt {attempt}/{max_attempts} succeeded - resuming collection ({endpoint})")
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "[FAILED] Request failed after {} of {} attempt(s)",
            self.attempt, self.max_attempts
        ));
        lines.push(format!("  Last error: {}", self.error));
        let status = self
            .error
            .status()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        lines.push(format!("  HTTP status: {status}"));
        lines.push(format!("  Endpoint: {}", self.endpoint));
        lines.push("  Suggestions:".to_string());

        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }

        lines.join("\n")
    }

    /// Derive suggestions tailored to the current retry context.
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error.suggestion().to_string()];
        if self.error.is_retryable() {
            suggestions.push(format!(
                "Try increasing --max-attempts (current: {})",
                self.max_attempts
            ));
            suggestions.push("Check Cloudflare status at https://www.cloudflarestatus.com".to_string());
        }
        suggestions
    }
}
