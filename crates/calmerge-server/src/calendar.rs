//! The merged calendar and its serialized forms.

use calmerge_core::{CalendarEvent, IcsWriter, TimeZoneBlock};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Name used when the configuration does not set one.
pub const DEFAULT_CALENDAR_NAME: &str = "Merged Calendar";

const DESCRIPTION: &str = "Aggregated from multiple iCal feeds";
const PRODID: &str = concat!("-//calmerge//calmerge ", env!("CARGO_PKG_VERSION"), "//EN");

/// Result of one merge pass. Built once, never modified afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct MergedCalendar {
    /// Calendar display name (`X-WR-CALNAME`).
    pub name: String,
    /// When the merge completed.
    pub generated_at: DateTime<Utc>,
    /// Events in output order, with namespaced ids.
    pub events: Vec<CalendarEvent>,
    /// Time zone definitions referenced by the events, one per TZID.
    #[serde(skip)]
    pub timezones: Vec<TimeZoneBlock>,
}

impl MergedCalendar {
    /// Serializes to iCalendar text.
    ///
    /// The output depends only on the name, time zones and events: the
    /// generation time is not written, and events without a `DTSTAMP` get
    /// their start instead of the current time.
    pub fn to_ics(&self) -> String {
        let mut w = IcsWriter::new(PRODID);
        w.property("METHOD", "PUBLISH")
            .text("X-WR-CALNAME", &self.name)
            .text("X-WR-CALDESC", DESCRIPTION);

        for tz in &self.timezones {
            w.timezone(tz);
        }
        for event in &self.events {
            w.event(event);
        }

        w.finish()
    }
}
