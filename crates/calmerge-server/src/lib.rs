//! Merging, caching and serving of calendar feeds.
//!
//! This crate provides the calmerge daemon that handles:
//! - Merging parsed feeds into one deterministic calendar
//! - An atomically swapped cache of the serialized result
//! - Background scheduling of refresh cycles
//! - The HTTP read path (ICS, JSON and status)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calmerge_feeds::{FeedSource, FetcherConfig, HttpFetcher};
//! use calmerge_server::{Aggregator, ServerConfig, SignalHandler, bind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sources = vec![FeedSource::new("https://example.com/team.ics")?];
//!     let config = ServerConfig::new(sources);
//!     let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
//!
//!     let listener = bind(config.socket_addr()).await?;
//!     let aggregator = Aggregator::new(config, fetcher)?;
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     aggregator
//!         .serve(listener, signals.shutdown(), signals.reload())
//!         .await?;
//!     Ok(())
//! }
//! ```

mod cache;
mod calendar;
mod config;
mod error;
mod http;
mod merge;
mod refresh;
mod rules;
mod scheduler;
mod server;
mod signals;

pub use cache::{CacheEntry, CacheSnapshot, CacheStore};
pub use calendar::{DEFAULT_CALENDAR_NAME, MergedCalendar};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use http::{AppState, ErrorResponse, JSON_PATH, STATUS_PATH, StatusView, router};
pub use merge::{
    CycleReport, MergeError, MergeOptions, MergeOutput, SOURCE_PROPERTY, SourceFailure,
    SourceStatus, WindowConfig, merge,
};
pub use refresh::Refresher;
pub use rules::{Action, ActionOp, Condition, ConditionOp, Rule, apply_rules};
pub use scheduler::{
    CycleOutcome, CyclePhase, Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle,
    SchedulerState, SharedSchedulerState, new_scheduler_state,
};
pub use server::{Aggregator, bind};
pub use signals::{ReloadSignal, ShutdownSignal, SignalHandler};
