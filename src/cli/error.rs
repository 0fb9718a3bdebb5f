//! CLI error types and conversions

use crate::fetcher::FetcherError;
use crate::graph::SinkError;
use crate::pipeline::PipelineError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(FetcherError),

    /// Pipeline error
    #[error("collection failed: {0}")]
    PipelineError(PipelineError),

    /// Sink or snapshot error
    #[error("output error: {0}")]
    SinkError(#[from] SinkError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Credential probe reported failure
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

impl From<FetcherError> for CliError {
    fn from(err: FetcherError) -> Self {
        match err {
            FetcherError::Configuration(message) => CliError::ConfigurationError(message),
            err if err.is_authentication() => {
                CliError::ConfigurationError(format!("API token was rejected: {err}"))
            }
            err => CliError::FetcherError(err),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Fetch(err) => CliError::from(err),
            PipelineError::Sink(err) => CliError::SinkError(err),
        }
    }
}
