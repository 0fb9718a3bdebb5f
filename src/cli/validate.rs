//! Credential validation subcommand

use clap::Parser;
use tracing::info;

use super::{Cli, CliError};
use crate::shutdown::SharedShutdown;

/// Probe the API with a one-item request to confirm the token works
#[derive(Parser, Debug)]
pub struct ValidateCommand {}

impl ValidateCommand {
    /// Execute the validation command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let collector = cli.build_collector(shutdown)?;
        info!(base_url = collector.client().base_url(), "Validating API token");

        if collector.validate_credentials().await? {
            println!("API token is valid");
            Ok(())
        } else {
            eprintln!("API token check failed");
            Err(CliError::ValidationFailed(
                "provider answered the probe with success=false".to_string(),
            ))
        }
    }
}
