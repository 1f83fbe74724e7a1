//! Fan-in of per-source outcomes into one calendar.

use std::collections::HashSet;

use calmerge_core::{CalendarEvent, TimeWindow, TimeZoneBlock, ics::escape_text};
use calmerge_feeds::{FeedSource, SourceOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calendar::{DEFAULT_CALENDAR_NAME, MergedCalendar};
use crate::rules::{Rule, apply_rules};

/// Extended property naming the source of each merged event.
pub const SOURCE_PROPERTY: &str = "X-CALENDAR-SOURCE";

/// Date filter relative to the merge time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub days_past: u32,
    pub days_future: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            days_past: 30,
            days_future: 365,
        }
    }
}

/// Settings for one merge pass.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub calendar_name: String,
    /// Drop non-recurring events starting outside this window.
    pub window: Option<WindowConfig>,
    pub rules: Vec<Rule>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            window: None,
            rules: Vec::new(),
        }
    }
}

/// Why a source contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Stable error kind name (`timeout`, `http_status`, ...).
    pub kind: String,
    pub message: String,
}

/// What one source did during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub url: String,
    /// Events that made it into the merged calendar.
    pub event_count: usize,
    /// Malformed `VEVENT` blocks skipped by the parser.
    pub skipped_blocks: usize,
    pub error: Option<SourceFailure>,
}

impl SourceStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-source outcome of one cycle, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub sources: Vec<SourceStatus>,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.sources.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.sources.len() - self.succeeded()
    }

    pub fn event_count(&self) -> usize {
        self.sources.iter().map(|s| s.event_count).sum()
    }
}

/// Cycle-level merge failure.
#[derive(Debug, Error)]
pub enum MergeError {
    /// No source produced a usable document. The previous cache entry must
    /// be kept.
    #[error("all {} sources failed", .report.sources.len())]
    AllSourcesFailed { report: CycleReport },
}

/// Successful merge result.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub calendar: MergedCalendar,
    pub report: CycleReport,
}

/// Merges the outcomes of one cycle.
///
/// `outcomes[i]` belongs to `sources[i]`. Failed sources add nothing but do
/// not stop the merge; only when every source failed is the cycle a failure.
///
/// Each event is tagged with [`SOURCE_PROPERTY`] and passed through the
/// rules, then filtered by the window on its rewritten start. Survivors get
/// the id `<source id>/<UID>`; within one source a repeated
/// `(UID, RECURRENCE-ID)` pair gets `-2`, `-3`, ... appended. Events are
/// stably sorted by start instant, so ties keep source order and then feed
/// order.
pub fn merge(
    sources: &[FeedSource],
    outcomes: Vec<SourceOutcome>,
    options: &MergeOptions,
    now: DateTime<Utc>,
) -> Result<MergeOutput, MergeError> {
    let window = options
        .window
        .map(|w| TimeWindow::around(now, w.days_past, w.days_future));

    let mut report = CycleReport::default();
    let mut events: Vec<CalendarEvent> = Vec::new();
    let mut timezones: Vec<TimeZoneBlock> = Vec::new();
    let mut seen_keys: HashSet<(String, Option<String>)> = HashSet::new();

    for (source, outcome) in sources.iter().zip(outcomes) {
        let feed = match outcome {
            Ok(feed) => feed,
            Err(err) => {
                warn!(source = %source.id(), kind = %err.kind(), error = %err, "Source failed");
                report.sources.push(SourceStatus {
                    source_id: source.id().to_string(),
                    url: source.url().to_string(),
                    event_count: 0,
                    skipped_blocks: 0,
                    error: Some(SourceFailure {
                        kind: err.kind().as_str().to_string(),
                        message: err.to_string(),
                    }),
                });
                continue;
            }
        };

        if feed.skipped_blocks > 0 {
            warn!(source = %source.id(), skipped = feed.skipped_blocks, "Skipped malformed events");
        }

        let mut contributed = 0usize;
        for mut event in feed.events {
            event.extended.set(SOURCE_PROPERTY, escape_text(source.id()));
            let event = apply_rules(&options.rules, event);

            if let Some(window) = &window
                && !event.is_recurring()
                && !window.contains_event_time(&event.start)
            {
                continue;
            }

            let id = unique_id(&mut seen_keys, source.id(), &event);
            events.push(event.with_uid(id));
            contributed += 1;
        }

        for tz in feed.timezones {
            if !timezones.iter().any(|t| t.tzid == tz.tzid) {
                timezones.push(tz);
            }
        }

        report.sources.push(SourceStatus {
            source_id: source.id().to_string(),
            url: source.url().to_string(),
            event_count: contributed,
            skipped_blocks: feed.skipped_blocks,
            error: None,
        });
    }

    if report.succeeded() == 0 {
        return Err(MergeError::AllSourcesFailed { report });
    }

    events.sort_by_key(|e| e.start.to_utc_datetime());

    debug!(
        events = events.len(),
        sources = report.succeeded(),
        failed = report.failed(),
        "Merged calendar"
    );

    Ok(MergeOutput {
        calendar: MergedCalendar {
            name: options.calendar_name.clone(),
            generated_at: now,
            events,
            timezones,
        },
        report,
    })
}

fn unique_id(
    seen: &mut HashSet<(String, Option<String>)>,
    source_id: &str,
    event: &CalendarEvent,
) -> String {
    let base = format!("{}/{}", source_id, event.uid);
    let recurrence = event.recurrence_id().map(str::to_string);

    let mut candidate = base.clone();
    let mut n = 2;
    while !seen.insert((candidate.clone(), recurrence.clone())) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    candidate
}
