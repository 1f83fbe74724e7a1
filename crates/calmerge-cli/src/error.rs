//! CLI error types.

use std::io;

use calmerge_core::TracingError;
use calmerge_feeds::FeedError;
use calmerge_server::ServerError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end the process with a failure status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    /// The HTTP client could not be built.
    #[error("fetcher setup failed: {0}")]
    Fetcher(#[from] FeedError),

    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),

    /// A one-shot refresh produced no calendar.
    #[error("refresh failed: {0}")]
    Refresh(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
