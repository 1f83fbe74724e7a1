//! Feed sources, fetching and the per-source pipeline.
//!
//! - [`FeedSource`] - one configured upstream calendar
//! - [`FeedFetcher`] - the fetch abstraction, with [`HttpFetcher`] as the
//!   real implementation
//! - [`fetch_and_parse`] - one source's fetch followed by parsing, producing
//!   a [`SourceOutcome`]
//! - [`FeedError`] - per-source failures, classified by [`FeedErrorKind`]
//!
//! # Example
//!
//! ```ignore
//! use calmerge_feeds::{FeedSource, FetcherConfig, HttpFetcher, fetch_and_parse};
//!
//! let fetcher = HttpFetcher::new(&FetcherConfig::default())?;
//! let source = FeedSource::new("webcal://example.com/team.ics")?;
//! let outcome = fetch_and_parse(&fetcher, &source).await;
//! ```

pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod source;

pub use error::{FeedError, FeedErrorKind, FeedResult};
pub use fetcher::{BoxFuture, FeedFetcher, FetcherConfig, HttpFetcher, RawFeedResult};
pub use pipeline::{SourceOutcome, fetch_and_parse};
pub use source::{FeedSource, SourceError};
