//! One refresh cycle: fetch and parse every source concurrently, merge,
//! and swap the cache.

use std::sync::Arc;

use calmerge_feeds::{FeedError, FeedFetcher, FeedSource, SourceOutcome, fetch_and_parse};
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::merge::{MergeError, MergeOptions, merge};
use crate::scheduler::{CycleOutcome, CyclePhase, SharedSchedulerState};

/// Runs refresh cycles against a fixed set of sources.
pub struct Refresher {
    sources: Arc<[FeedSource]>,
    fetcher: Arc<dyn FeedFetcher>,
    options: MergeOptions,
    store: Arc<CacheStore>,
    state: SharedSchedulerState,
    fetch_limit: Option<Arc<Semaphore>>,
}

impl Refresher {
    pub fn new(
        sources: Vec<FeedSource>,
        fetcher: Arc<dyn FeedFetcher>,
        options: MergeOptions,
        store: Arc<CacheStore>,
        state: SharedSchedulerState,
    ) -> Self {
        Self {
            sources: sources.into(),
            fetcher,
            options,
            store,
            state,
            fetch_limit: None,
        }
    }

    /// Caps how many sources are fetched at the same time.
    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = Some(Arc::new(Semaphore::new(limit)));
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Runs one complete cycle.
    ///
    /// The cache is replaced exactly once when at least one source succeeded
    /// and left untouched otherwise. Dropping the returned future before it
    /// completes leaves the cache untouched as well.
    pub async fn run_cycle(&self) -> CycleOutcome {
        info!(sources = self.sources.len(), "Refreshing calendar");
        self.state.write().await.record_start();

        let outcomes = self.fetch_all().await;

        self.state.write().await.phase = CyclePhase::Merging;
        match merge(&self.sources, outcomes, &self.options, Utc::now()) {
            Ok(output) => {
                let events = output.calendar.events.len();
                let failed_sources = output.report.failed();
                self.store
                    .replace(CacheEntry::new(output.calendar, output.report.clone()));
                self.state.write().await.record_swap(output.report);
                CycleOutcome::Swapped {
                    events,
                    failed_sources,
                }
            }
            Err(err) => {
                let message = err.to_string();
                let MergeError::AllSourcesFailed { report } = err;
                self.state
                    .write()
                    .await
                    .record_total_failure(report, message);
                CycleOutcome::SkippedOnTotalFailure
            }
        }
    }

    /// Fetches and parses every source in its own task and waits for all of
    /// them. Outcomes are returned in source order.
    async fn fetch_all(&self) -> Vec<SourceOutcome> {
        let tasks = self.sources.iter().cloned().map(|source| {
            let fetcher = Arc::clone(&self.fetcher);
            let limit = self.fetch_limit.clone();
            tokio::spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => Some(
                        semaphore
                            .acquire_owned()
                            .await
                            .map_err(|e| FeedError::internal("fetch limiter closed").with_source(e))?,
                    ),
                    None => None,
                };
                fetch_and_parse(fetcher.as_ref(), &source).await
            })
        });

        let joined = join_all(tasks).await;

        joined
            .into_iter()
            .zip(self.sources.iter())
            .map(|(result, source)| {
                result.unwrap_or_else(|join_err| {
                    warn!(source = %source.id(), error = %join_err, "Fetch task failed");
                    Err(FeedError::internal(format!("fetch task failed: {}", join_err))
                        .with_feed(source.id())
                        .with_source(join_err))
                })
            })
            .collect()
    }
}
