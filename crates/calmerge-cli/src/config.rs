//! Configuration file.
//!
//! Settings live in a single TOML file. Without `--config` the first of
//! `./config.toml` and `~/.config/calmerge/config.toml` that exists is used.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use calmerge_core::{TracingConfig, TracingOutputFormat};
use calmerge_feeds::{FeedSource, FetcherConfig, SourceError};
use calmerge_server::{DEFAULT_CALENDAR_NAME, Rule, ServerConfig, ServerError, WindowConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// File name looked up in the working directory and the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Problems loading or interpreting the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file found (looked for {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid feed: {0}")]
    Feed(#[from] SourceError),

    #[error("invalid log level '{0}'")]
    LogLevel(String),

    #[error("set the window either in [window] or with top-level days_past/days_future, not both")]
    WindowTwice,

    #[error(transparent)]
    Invalid(#[from] ServerError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub port: u16,
    pub bind: IpAddr,
    /// Path of the ICS endpoint.
    pub path: String,
    pub refresh_interval_seconds: u64,
    pub fetch_timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_fetches: Option<usize>,
    pub calendar_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// `Retry-After` sent before the first successful refresh.
    pub retry_after_seconds: u64,
    /// Flat form of `[window]`; the unset bound keeps its default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_past: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_future: Option<u32>,
    pub feeds: Vec<FeedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    pub logging: LoggingSettings,
}

impl Default for FileConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            port: server.port,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            path: server.path,
            refresh_interval_seconds: server.scheduler.refresh_interval.as_secs(),
            fetch_timeout_seconds: FetcherConfig::DEFAULT_TIMEOUT_SECS,
            max_concurrent_fetches: None,
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            user_agent: None,
            retry_after_seconds: server.retry_after_secs,
            days_past: None,
            days_future: None,
            feeds: Vec::new(),
            window: None,
            rules: Vec::new(),
            logging: LoggingSettings::default(),
        }
    }
}

/// One entry of `feeds`: a bare URL or a table with an explicit id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Url(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        url: String,
    },
}

impl FeedEntry {
    pub fn to_source(&self) -> Result<FeedSource, SourceError> {
        match self {
            Self::Url(url) | Self::Detailed { id: None, url } => FeedSource::new(url),
            Self::Detailed { id: Some(id), url } => FeedSource::with_id(id.clone(), url),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub format: TracingOutputFormat,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: TracingOutputFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

impl FileConfig {
    /// Parses TOML text. `path` is only used in error messages.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Finds and loads the configuration file, returning the path used.
    pub fn load(explicit: Option<&Path>) -> Result<(PathBuf, Self), ConfigError> {
        let path = locate(explicit, &search_paths())?;
        let config = Self::load_from(&path)?;
        Ok((path, config))
    }

    /// Returns the configuration file path under the user config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calmerge")
            .join(CONFIG_FILE_NAME)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Builds the validated runtime configuration.
    /// The date window from `[window]` or the top-level keys.
    pub fn window(&self) -> Result<Option<WindowConfig>, ConfigError> {
        let flat = self.days_past.is_some() || self.days_future.is_some();
        match (self.window, flat) {
            (Some(_), true) => Err(ConfigError::WindowTwice),
            (Some(window), false) => Ok(Some(window)),
            (None, true) => {
                let default = WindowConfig::default();
                Ok(Some(WindowConfig {
                    days_past: self.days_past.unwrap_or(default.days_past),
                    days_future: self.days_future.unwrap_or(default.days_future),
                }))
            }
            (None, false) => Ok(None),
        }
    }

    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let sources = self
            .feeds
            .iter()
            .map(FeedEntry::to_source)
            .collect::<Result<Vec<_>, _>>()?;

        let mut fetcher =
            FetcherConfig::default().with_timeout(Duration::from_secs(self.fetch_timeout_seconds));
        if let Some(ref user_agent) = self.user_agent {
            fetcher = fetcher.with_user_agent(user_agent);
        }

        let mut config = ServerConfig::new(sources)
            .with_bind(self.bind)
            .with_port(self.port)
            .with_path(&self.path)
            .with_refresh_interval(Duration::from_secs(self.refresh_interval_seconds))
            .with_fetcher(fetcher)
            .with_calendar_name(&self.calendar_name)
            .with_rules(self.rules.clone());
        config.max_concurrent_fetches = self.max_concurrent_fetches;
        config.merge.window = self.window()?;
        config.retry_after_secs = self.retry_after_seconds;

        config.validate()?;
        Ok(config)
    }

    /// Applies `[logging]` to the command's preset, before command-line
    /// overrides.
    pub fn tracing_config(&self, preset: TracingConfig) -> Result<TracingConfig, ConfigError> {
        let level = Level::from_str(&self.logging.level)
            .map_err(|_| ConfigError::LogLevel(self.logging.level.clone()))?;
        Ok(preset.with_level(level).with_format(self.logging.format))
    }
}

/// Candidate files in lookup order, used when `--config` is not given.
pub fn search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(CONFIG_FILE_NAME), FileConfig::default_path()]
}

/// Picks the configuration file: `explicit` if given, otherwise the first
/// existing entry of `candidates`.
pub fn locate(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
}
