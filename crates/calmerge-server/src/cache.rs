//! The live merged calendar.
//!
//! [`CacheStore`] holds at most one [`CacheEntry`] behind an atomic pointer.
//! The refresh cycle swaps in a complete new entry; HTTP handlers load the
//! current pointer and never wait on a refresh.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::calendar::MergedCalendar;
use crate::merge::CycleReport;

/// One successful refresh, with its serialized form.
#[derive(Debug)]
pub struct CacheEntry {
    pub calendar: MergedCalendar,
    /// iCalendar body served on the read endpoint.
    pub ics: Bytes,
    /// Quoted strong entity tag of `ics`.
    pub etag: String,
    pub updated_at: DateTime<Utc>,
    /// Per-source outcome of the cycle that built this entry.
    pub sources: CycleReport,
}

impl CacheEntry {
    /// Serializes the calendar and computes its ETag.
    pub fn new(calendar: MergedCalendar, sources: CycleReport) -> Self {
        let ics = calendar.to_ics();
        let etag = format!("\"{}\"", hex::encode(Sha256::digest(ics.as_bytes())));
        Self {
            updated_at: calendar.generated_at,
            calendar,
            ics: Bytes::from(ics),
            etag,
            sources,
        }
    }

    pub fn event_count(&self) -> usize {
        self.calendar.events.len()
    }
}

/// What a reader sees.
#[derive(Debug, Clone)]
pub enum CacheSnapshot {
    /// No refresh has succeeded yet.
    Cold,
    Warm(Arc<CacheEntry>),
}

impl CacheSnapshot {
    pub fn entry(&self) -> Option<&Arc<CacheEntry>> {
        match self {
            Self::Cold => None,
            Self::Warm(entry) => Some(entry),
        }
    }

    pub fn is_warm(&self) -> bool {
        matches!(self, Self::Warm(_))
    }
}

/// Single-writer, many-reader holder of the current entry.
#[derive(Debug, Default)]
pub struct CacheStore {
    current: ArcSwapOption<CacheEntry>,
}

impl CacheStore {
    /// Creates a store in the not-yet-warmed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current entry without blocking.
    pub fn read(&self) -> CacheSnapshot {
        match self.current.load_full() {
            Some(entry) => CacheSnapshot::Warm(entry),
            None => CacheSnapshot::Cold,
        }
    }

    /// Atomically installs `entry`, returning the one it replaced.
    pub fn replace(&self, entry: CacheEntry) -> Option<Arc<CacheEntry>> {
        debug!(
            events = entry.event_count(),
            etag = %entry.etag,
            "Replacing cache entry"
        );
        self.current.swap(Some(Arc::new(entry)))
    }

    pub fn is_warm(&self) -> bool {
        self.current.load().is_some()
    }
}
