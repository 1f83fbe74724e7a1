//! Core types: events, times, tolerant ICS reading and writing, tracing.

pub mod error;
pub mod event;
pub mod ics;
pub mod time;
pub mod tracing;

pub use error::ParseError;
pub use event::{CalendarEvent, ExtendedProperties, ExtendedProperty, Param};
pub use ics::{IcsWriter, ParsedFeed, TimeZoneBlock, parse_feed};
pub use time::{EventTime, TimeWindow};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
