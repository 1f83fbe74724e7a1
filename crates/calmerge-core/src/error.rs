//! Document-level parse errors.

use thiserror::Error;

/// A failure that makes a whole ICS document unusable.
///
/// Individual malformed `VEVENT` blocks are not errors; they are skipped and
/// counted in [`ParsedFeed::skipped_blocks`](crate::ParsedFeed).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input was empty or only whitespace.
    #[error("document is empty")]
    Empty,

    /// The input does not contain a `BEGIN:VCALENDAR` line.
    #[error("document is not an iCalendar stream")]
    NotCalendar,
}
