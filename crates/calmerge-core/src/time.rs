//! Time types for calendar events.
//!
//! [`EventTime`] keeps the form a `DTSTART`/`DTEND` value was written in
//! (UTC instant, zoned wall-clock time, floating time or all-day date) so
//! that it can be written back unchanged, while still exposing a UTC
//! instant for ordering. [`TimeWindow`] bounds the optional date filter.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y%m%d";
const DATETIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// The start or end time of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventTime {
    /// An absolute instant (`20240101T100000Z`).
    DateTime(DateTime<Utc>),
    /// A wall-clock time in a named zone (`DTSTART;TZID=Europe/Paris:...`).
    Zoned {
        /// The local wall-clock time.
        local: NaiveDateTime,
        /// The zone identifier as written in the feed.
        tzid: String,
    },
    /// A wall-clock time without zone information.
    Floating(NaiveDateTime),
    /// An all-day date (`VALUE=DATE`).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Parses an iCalendar date or date-time value.
    ///
    /// Handles formats like:
    /// - `20250205T100000Z` (UTC)
    /// - `20250205T100000` with a `TZID` (zoned) or without (floating)
    /// - `20250205` (date only, or any value when `date_only` is set)
    pub fn parse(value: &str, tzid: Option<&str>, date_only: bool) -> Option<Self> {
        let s = value.trim();

        if date_only || (s.len() == 8 && s.chars().all(|c| c.is_ascii_digit())) {
            let date = NaiveDate::parse_from_str(s, DATE_FORMAT).ok()?;
            return Some(Self::AllDay(date));
        }

        if let Some(stripped) = s.strip_suffix('Z') {
            let dt = NaiveDateTime::parse_from_str(stripped, DATETIME_FORMAT).ok()?;
            return Some(Self::DateTime(dt.and_utc()));
        }

        let local = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok()?;
        Some(match tzid {
            Some(tzid) if !tzid.is_empty() => Self::Zoned {
                local,
                tzid: tzid.to_string(),
            },
            _ => Self::Floating(local),
        })
    }

    /// Returns `true` if this is an all-day date.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the zone identifier for zoned times.
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }

    /// Converts to a UTC instant for ordering and filtering.
    ///
    /// Zoned times are resolved through the IANA database; identifiers it does
    /// not know are treated as UTC. Floating times and all-day dates (at
    /// midnight) are also read as UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::Zoned { local, tzid } => resolve_zoned(local, tzid),
            Self::Floating(local) => local.and_utc(),
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns the value as written after the `:` of a content line.
    pub fn ics_value(&self) -> String {
        match self {
            Self::DateTime(dt) => format!("{}Z", dt.format(DATETIME_FORMAT)),
            Self::Zoned { local, .. } | Self::Floating(local) => {
                local.format(DATETIME_FORMAT).to_string()
            }
            Self::AllDay(date) => date.format(DATE_FORMAT).to_string(),
        }
    }
}

fn resolve_zoned(local: &NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    match tzid.trim_start_matches('/').parse::<Tz>() {
        Ok(tz) => tz
            .from_local_datetime(local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            // Inside a DST gap: the wall-clock time does not exist.
            .unwrap_or_else(|| local.and_utc()),
        Err(_) => local.and_utc(),
    }
}

/// A time window used to drop events far from the present.
///
/// Represents a closed interval `[start, end]` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window. `start` should not be after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a window reaching `days_past` back and `days_future` ahead of `now`.
    pub fn around(now: DateTime<Utc>, days_past: u32, days_future: u32) -> Self {
        Self::new(
            now - Duration::days(i64::from(days_past)),
            now + Duration::days(i64::from(days_future)),
        )
    }

    /// Checks if a datetime falls within this window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt <= self.end
    }

    /// Checks if an event time falls within this window.
    pub fn contains_event_time(&self, et: &EventTime) -> bool {
        self.contains(et.to_utc_datetime())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod event_time {
        use super::*;

        #[test]
        fn parse_utc() {
            let et = EventTime::parse("20250205T143000Z", None, false).unwrap();
            assert_eq!(et, EventTime::DateTime(utc(2025, 2, 5, 14, 30, 0)));
            assert_eq!(et.ics_value(), "20250205T143000Z");
        }

        #[test]
        fn parse_date_only() {
            let et = EventTime::parse("20250210", None, false).unwrap();
            assert_eq!(et, EventTime::AllDay(date(2025, 2, 10)));
            assert!(et.is_all_day());
            assert_eq!(et.to_utc_datetime(), utc(2025, 2, 10, 0, 0, 0));
        }

        #[test]
        fn parse_zoned_resolves_through_tz_database() {
            let et = EventTime::parse("20240115T100000", Some("Europe/Berlin"), false).unwrap();
            assert_eq!(et.tzid(), Some("Europe/Berlin"));
            // CET is UTC+1 in January.
            assert_eq!(et.to_utc_datetime(), utc(2024, 1, 15, 9, 0, 0));
            assert_eq!(et.ics_value(), "20240115T100000");
        }

        #[test]
        fn unknown_zone_is_read_as_utc() {
            let et = EventTime::parse("20240115T100000", Some("Custom Zone"), false).unwrap();
            assert_eq!(et.to_utc_datetime(), utc(2024, 1, 15, 10, 0, 0));
        }

        #[test]
        fn parse_floating() {
            let et = EventTime::parse("20240115T100000", None, false).unwrap();
            assert!(matches!(et, EventTime::Floating(_)));
            assert!(et.tzid().is_none());
        }

        #[test]
        fn parse_rejects_garbage() {
            assert!(EventTime::parse("tomorrow", None, false).is_none());
            assert!(EventTime::parse("2024-01-01", None, false).is_none());
            assert!(EventTime::parse("20240101T1000Z", None, false).is_none());
            assert!(EventTime::parse("20240101T100000", None, true).is_none());
        }

        #[test]
        fn serde_roundtrip() {
            let et = EventTime::Zoned {
                local: date(2024, 3, 1).and_hms_opt(8, 0, 0).unwrap(),
                tzid: "America/New_York".into(),
            };
            let json = serde_json::to_string(&et).unwrap();
            let parsed: EventTime = serde_json::from_str(&json).unwrap();
            assert_eq!(et, parsed);
        }
    }

    mod time_window {
        use super::*;

        #[test]
        fn around_now() {
            let now = utc(2025, 2, 5, 12, 0, 0);
            let window = TimeWindow::around(now, 30, 365);
            assert_eq!(window.start, utc(2025, 1, 6, 12, 0, 0));
            assert_eq!(window.end, utc(2026, 2, 5, 12, 0, 0));
        }

        #[test]
        fn contains_is_inclusive() {
            let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));
            assert!(window.contains(utc(2025, 2, 5, 9, 0, 0)));
            assert!(window.contains(utc(2025, 2, 5, 17, 0, 0)));
            assert!(!window.contains(utc(2025, 2, 5, 17, 0, 1)));
            assert!(!window.contains_event_time(&EventTime::AllDay(date(2025, 2, 5))));
        }
    }
}
