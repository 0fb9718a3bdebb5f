//! CLI command implementations

pub mod collect;
pub mod error;
pub mod validate;

pub use collect::{Cli, CollectArgs, Commands};
pub use error::CliError;
pub use validate::ValidateCommand;
