//! Command-line interface definition.

use std::net::IpAddr;
use std::path::PathBuf;

use calmerge_core::TracingOutputFormat;
use clap::{Parser, Subcommand};

/// calmerge - merge iCalendar feeds into one served calendar
#[derive(Debug, Parser)]
#[command(name = "calmerge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<TracingOutputFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve the merged calendar over HTTP (default)
    Serve {
        /// Port to listen on, overriding the config file
        #[arg(long, short, env = "CALMERGE_PORT")]
        port: Option<u16>,

        /// Address to bind, overriding the config file
        #[arg(long)]
        bind: Option<IpAddr>,
    },

    /// Run one refresh cycle and print the merged calendar
    Once {
        /// Print the JSON rendering instead of iCalendar
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Default for Command {
    fn default() -> Self {
        Self::Serve {
            port: None,
            bind: None,
        }
    }
}

/// Configuration actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show which configuration file would be used
    Path,
}
