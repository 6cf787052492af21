//! CLI command implementations

pub mod enrich;
pub mod error;
pub mod status;

pub use enrich::{Cli, Commands, EnrichArgs, OutputFormat};
pub use error::CliError;
pub use status::StatusArgs;
