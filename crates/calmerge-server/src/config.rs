//! Server configuration.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use calmerge_feeds::{FeedSource, FetcherConfig};

use crate::error::{ServerError, ServerResult};
use crate::http::{JSON_PATH, STATUS_PATH};
use crate::merge::{MergeOptions, WindowConfig};
use crate::rules::Rule;
use crate::scheduler::SchedulerConfig;

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: IpAddr,
    pub port: u16,
    /// Path of the ICS endpoint.
    pub path: String,
    /// Upstream feeds, in merge order.
    pub sources: Vec<FeedSource>,
    pub scheduler: SchedulerConfig,
    pub fetcher: FetcherConfig,
    /// Cap on simultaneous fetches; `None` runs every source at once.
    pub max_concurrent_fetches: Option<usize>,
    pub merge: MergeOptions,
    /// `Retry-After` sent while the cache is cold.
    pub retry_after_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: Self::DEFAULT_PORT,
            path: Self::DEFAULT_PATH.to_string(),
            sources: Vec::new(),
            scheduler: SchedulerConfig::default(),
            fetcher: FetcherConfig::default(),
            max_concurrent_fetches: None,
            merge: MergeOptions::default(),
            retry_after_secs: 5,
        }
    }
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_PATH: &'static str = "/calendar.ics";

    /// Creates a configuration for the given sources.
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.scheduler.refresh_interval = interval;
        self
    }

    pub fn with_fetcher(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = Some(max);
        self
    }

    pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
        self.merge.calendar_name = name.into();
        self
    }

    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.merge.window = Some(window);
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.merge.rules = rules;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Checks the invariants the server relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] describing the first problem found.
    pub fn validate(&self) -> ServerResult<()> {
        if self.sources.is_empty() {
            return Err(ServerError::config("at least one feed must be configured"));
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.id()) {
                return Err(ServerError::config(format!(
                    "duplicate feed id '{}'",
                    source.id()
                )));
            }
        }

        if self.scheduler.refresh_interval.is_zero() {
            return Err(ServerError::config("refresh interval must be greater than zero"));
        }
        if self.fetcher.timeout.is_zero() {
            return Err(ServerError::config("fetch timeout must be greater than zero"));
        }
        if self.max_concurrent_fetches == Some(0) {
            return Err(ServerError::config(
                "max_concurrent_fetches must be greater than zero",
            ));
        }

        if !self.path.starts_with('/') || self.path.len() < 2 {
            return Err(ServerError::config(format!(
                "path '{}' must start with '/' and name a resource",
                self.path
            )));
        }
        if self.path == JSON_PATH || self.path == STATUS_PATH {
            return Err(ServerError::config(format!(
                "path '{}' is reserved",
                self.path
            )));
        }

        for rule in &self.merge.rules {
            rule.validate().map_err(ServerError::config)?;
        }

        Ok(())
    }
}
