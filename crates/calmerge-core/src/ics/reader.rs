//! Tolerant VEVENT extraction.
//!
//! The document is cut into `VEVENT` and `VTIMEZONE` blocks first; each block
//! then goes through the `icalendar` parser on its own, so one broken block
//! cannot take the rest of the feed down with it.

use icalendar::parser::{Component, Property, read_calendar, unfold};
use tracing::debug;

use super::unescape_text;
use crate::error::ParseError;
use crate::event::{CalendarEvent, ExtendedProperties, ExtendedProperty, Param};
use crate::time::EventTime;

/// A `VTIMEZONE` definition carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeZoneBlock {
    /// The `TZID` the definition declares.
    pub tzid: String,
    /// Every line from `BEGIN:VTIMEZONE` to `END:VTIMEZONE` inclusive,
    /// sub-components flattened in place.
    pub lines: Vec<ExtendedProperty>,
}

/// Everything usable that was read from one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Events in document order.
    pub events: Vec<CalendarEvent>,
    /// Number of `VEVENT` blocks that were dropped as malformed.
    pub skipped_blocks: usize,
    /// Time zone definitions found in the document.
    pub timezones: Vec<TimeZoneBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Event,
    TimeZone,
}

impl BlockKind {
    fn component(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::TimeZone => "VTIMEZONE",
        }
    }
}

/// Parses ICS content into events, tagging each with `source`.
///
/// Malformed `VEVENT` blocks are skipped and counted. A block is malformed
/// when the parser rejects it, when it lacks `UID` or `DTSTART`, when a date
/// is unreadable, or when it is never closed.
///
/// # Errors
///
/// Fails only when the document as a whole is unusable: empty input, or no
/// `BEGIN:VCALENDAR` anywhere.
pub fn parse_feed(text: &str, source: &str) -> Result<ParsedFeed, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let unfolded = unfold(text);
    let lines: Vec<&str> = unfolded.lines().filter(|l| !l.trim().is_empty()).collect();
    if !lines.iter().any(|l| is_marker(l, "BEGIN", "VCALENDAR")) {
        return Err(ParseError::NotCalendar);
    }

    let mut feed = ParsedFeed::default();
    let mut open: Option<(BlockKind, Vec<&str>)> = None;

    for line in lines {
        if is_marker(line, "BEGIN", "VEVENT") {
            if matches!(open, Some((BlockKind::Event, _))) {
                feed.skip(source, "block not closed before next VEVENT");
            }
            open = Some((BlockKind::Event, vec![line]));
            continue;
        }

        match open.take() {
            Some((kind, _)) if is_marker(line, "END", "VCALENDAR") => {
                if kind == BlockKind::Event {
                    feed.skip(source, "block not closed before END:VCALENDAR");
                }
            }
            Some((kind, mut block)) => {
                block.push(line);
                if is_marker(line, "END", kind.component()) {
                    feed.finish_block(kind, &block, source);
                } else {
                    open = Some((kind, block));
                }
            }
            None if is_marker(line, "BEGIN", "VTIMEZONE") => {
                open = Some((BlockKind::TimeZone, vec![line]));
            }
            None => {}
        }
    }

    if matches!(open, Some((BlockKind::Event, _))) {
        feed.skip(source, "block not closed before end of input");
    }

    debug!(
        source = %source,
        events = feed.events.len(),
        skipped = feed.skipped_blocks,
        timezones = feed.timezones.len(),
        "Parsed feed"
    );

    Ok(feed)
}

impl ParsedFeed {
    fn skip(&mut self, source: &str, reason: &str) {
        self.skipped_blocks += 1;
        debug!(source = %source, reason, "Skipping malformed VEVENT");
    }

    fn finish_block(&mut self, kind: BlockKind, block: &[&str], source: &str) {
        let wrapped = format!(
            "BEGIN:VCALENDAR\r\n{}\r\nEND:VCALENDAR\r\n",
            block.join("\r\n")
        );
        let calendar = match read_calendar(&wrapped) {
            Ok(calendar) => calendar,
            Err(e) => {
                let reason = e.to_string();
                match kind {
                    BlockKind::Event => self.skip(source, &reason),
                    BlockKind::TimeZone => {
                        debug!(source = %source, reason = %reason, "Dropping unreadable VTIMEZONE")
                    }
                }
                return;
            }
        };

        let Some(component) = calendar
            .components
            .iter()
            .find(|c| c.name.as_ref().eq_ignore_ascii_case(kind.component()))
        else {
            if kind == BlockKind::Event {
                self.skip(source, "no VEVENT component");
            }
            return;
        };

        match kind {
            BlockKind::Event => match read_event(component, source) {
                Ok(event) => self.events.push(event),
                Err(reason) => self.skip(source, reason),
            },
            BlockKind::TimeZone => {
                if let Some(tz) = read_timezone(component) {
                    self.timezones.push(tz);
                }
            }
        }
    }
}

fn is_marker(line: &str, kind: &str, component: &str) -> bool {
    line.split_once(':').is_some_and(|(name, value)| {
        name.trim().eq_ignore_ascii_case(kind) && value.trim().eq_ignore_ascii_case(component)
    })
}

/// Builds an event from a parsed `VEVENT`. Sub-components such as `VALARM`
/// are not part of the event.
fn read_event(vevent: &Component<'_>, source: &str) -> Result<CalendarEvent, &'static str> {
    let mut uid: Option<String> = None;
    let mut start: Option<EventTime> = None;
    let mut end: Option<EventTime> = None;
    let mut title = String::new();
    let mut description = None;
    let mut location = None;
    let mut extended = ExtendedProperties::new();

    for prop in &vevent.properties {
        let value = prop.val.as_ref();
        match prop.name.as_ref().to_ascii_uppercase().as_str() {
            "UID" => uid = Some(value.trim().to_string()),
            "DTSTART" => start = Some(read_time(prop).ok_or("invalid DTSTART")?),
            "DTEND" => end = Some(read_time(prop).ok_or("invalid DTEND")?),
            "SUMMARY" => title = unescape_text(value),
            "DESCRIPTION" => description = Some(unescape_text(value)),
            "LOCATION" => location = Some(unescape_text(value)),
            _ => extended.push(to_extended(prop)),
        }
    }

    let uid = uid.filter(|u| !u.is_empty()).ok_or("missing UID")?;
    let start = start.ok_or("missing DTSTART")?;

    let mut event = CalendarEvent::new(uid, start, source)
        .with_title(title)
        .with_extended(extended);
    if let Some(end) = end {
        event = event.with_end(end);
    }
    if let Some(description) = description {
        event = event.with_description(description);
    }
    if let Some(location) = location {
        event = event.with_location(location);
    }
    Ok(event)
}

fn read_timezone(vtimezone: &Component<'_>) -> Option<TimeZoneBlock> {
    let tzid = vtimezone.find_prop("TZID")?.val.as_ref().trim().to_string();
    let mut lines = Vec::new();
    flatten(vtimezone, &mut lines);
    Some(TimeZoneBlock { tzid, lines })
}

fn flatten(component: &Component<'_>, out: &mut Vec<ExtendedProperty>) {
    let name = component.name.as_ref().to_ascii_uppercase();
    out.push(ExtendedProperty::new("BEGIN", name.as_str()));
    out.extend(component.properties.iter().map(to_extended));
    for child in &component.components {
        flatten(child, out);
    }
    out.push(ExtendedProperty::new("END", name));
}

fn read_time(prop: &Property<'_>) -> Option<EventTime> {
    let date_only = param(prop, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"));
    EventTime::parse(prop.val.as_ref(), param(prop, "TZID"), date_only)
}

fn param<'p>(prop: &'p Property<'_>, key: &str) -> Option<&'p str> {
    prop.params
        .iter()
        .find(|p| p.key.as_ref().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_ref().trim_matches('"'))
}

fn to_extended(prop: &Property<'_>) -> ExtendedProperty {
    let params = prop
        .params
        .iter()
        .map(|p| {
            Param::new(
                p.key.as_ref(),
                p.val.as_ref().map(|v| v.as_ref()).unwrap_or_default(),
            )
        })
        .collect();
    ExtendedProperty::new(prop.name.as_ref(), prop.val.as_ref()).with_params(params)
}
