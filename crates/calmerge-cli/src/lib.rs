//! The `calmerge` command-line interface.
//!
//! Loads the configuration file, sets up logging and runs one of the
//! commands: the HTTP server, a single refresh, or config inspection.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{CliError, CliResult};
