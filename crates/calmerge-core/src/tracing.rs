//! Tracing setup for the calmerge binaries.
//!
//! `serve` runs as a daemon and logs its HTTP requests; `once` and the
//! `config` commands only need warnings and the refresh summary on stderr,
//! with stdout left for their output.
//!
//! ```ignore
//! use calmerge_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::daemon())?;
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingOutputFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line.
    Json,
}

impl FromStr for TracingOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown log format '{other}' (expected pretty, compact or json)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for calmerge's own targets when `RUST_LOG` is not set.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Source file and line on every event.
    pub locations: bool,
    pub timestamps: bool,
    /// Let per-request logs from the HTTP layer (`tower_http`) through.
    pub http_requests: bool,
}

impl TracingConfig {
    /// Long-running `serve`: timestamped compact lines, request logs on.
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Compact,
            locations: false,
            timestamps: true,
            http_requests: true,
        }
    }

    /// Single refresh (`once`, `config`): no timestamps, no server.
    #[must_use]
    pub fn one_shot() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Compact,
            locations: false,
            timestamps: false,
            http_requests: false,
        }
    }

    /// `--debug`: everything at DEBUG with file and line.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: TracingOutputFormat::Compact,
            locations: true,
            timestamps: false,
            http_requests: true,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn directive(&self) -> String {
        let mut directive = format!("warn,calmerge={}", self.level);
        if self.http_requests {
            directive.push_str(&format!(",tower_http={}", self.level));
        }
        directive
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` replaces the configured filter when set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directive()));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.locations)
        .with_line_number(config.locations);

    let layer = match (config.format, config.timestamps) {
        (TracingOutputFormat::Pretty, true) => layer.pretty().boxed(),
        (TracingOutputFormat::Pretty, false) => layer.pretty().without_time().boxed(),
        (TracingOutputFormat::Compact, true) => layer.compact().boxed(),
        (TracingOutputFormat::Compact, false) => layer.compact().without_time().boxed(),
        (TracingOutputFormat::Json, _) => layer.json().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
