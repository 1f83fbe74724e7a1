//! Deterministic iCalendar output through `icalendar::Calendar`.

use icalendar::{Calendar, Component, Event, Property};

use super::escape_text;
use super::reader::TimeZoneBlock;
use crate::event::{CalendarEvent, Param};
use crate::time::EventTime;

/// Builds one calendar document.
///
/// The same calls always produce the same bytes: every event carries its own
/// `UID` and `DTSTAMP`, and parameters keep the order they were given in.
pub struct IcsWriter {
    calendar: Calendar,
    prodid: String,
}

impl IcsWriter {
    /// Starts a calendar whose `PRODID` is `prodid`.
    pub fn new(prodid: impl Into<String>) -> Self {
        Self {
            calendar: Calendar::new(),
            prodid: prodid.into(),
        }
    }

    /// Adds a calendar property whose value is already in iCalendar form.
    pub fn property(&mut self, name: &str, value: &str) -> &mut Self {
        self.calendar.append_property(Property::new(name, value));
        self
    }

    /// Adds a calendar TEXT property, escaping `value`.
    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.property(name, &escape_text(value))
    }

    /// Adds a `VTIMEZONE` definition in its source order.
    ///
    /// The definition is written line by line as calendar properties, which
    /// land after the header and before any event.
    pub fn timezone(&mut self, tz: &TimeZoneBlock) -> &mut Self {
        for line in &tz.lines {
            self.calendar
                .append_property(property(&line.name, &line.params, &line.value));
        }
        self
    }

    /// Adds an event. A missing `DTSTAMP` is taken from the event start.
    pub fn event(&mut self, event: &CalendarEvent) -> &mut Self {
        self.calendar.push(to_vevent(event));
        self
    }

    /// Renders the document with CRLF line endings.
    pub fn finish(self) -> String {
        let rendered = self.calendar.to_string();
        let mut out = String::with_capacity(rendered.len());
        let mut prodid_written = false;
        for line in rendered.lines() {
            if !prodid_written && line.starts_with("PRODID:") {
                out.push_str("PRODID:");
                out.push_str(&self.prodid);
                prodid_written = true;
            } else {
                out.push_str(line);
            }
            out.push_str("\r\n");
        }
        out
    }
}

fn to_vevent(event: &CalendarEvent) -> Event {
    let mut vevent = Event::new();

    // UID and DTSTAMP must be single-valued properties, otherwise the crate
    // writes generated ones.
    vevent.add_property("UID", event.uid.as_str());
    vevent.add_property("DTSTAMP", dtstamp(event));

    vevent.append_multi_property(time_property("DTSTART", &event.start));
    if let Some(end) = &event.end {
        vevent.append_multi_property(time_property("DTEND", end));
    }
    if !event.title.is_empty() {
        vevent.append_multi_property(Property::new("SUMMARY", escape_text(&event.title)));
    }
    if let Some(description) = &event.description {
        vevent.append_multi_property(Property::new("DESCRIPTION", escape_text(description)));
    }
    if let Some(location) = &event.location {
        vevent.append_multi_property(Property::new("LOCATION", escape_text(location)));
    }

    for prop in event.extended.iter().filter(|p| p.name != "DTSTAMP") {
        vevent.append_multi_property(property(&prop.name, &prop.params, &prop.value));
    }

    vevent.done()
}

fn dtstamp(event: &CalendarEvent) -> String {
    match event.extended.get("DTSTAMP") {
        Some(stamp) => stamp.to_string(),
        None => format!("{}Z", event.start.to_utc_datetime().format("%Y%m%dT%H%M%S")),
    }
}

fn time_property(name: &str, time: &EventTime) -> Property {
    let params = match time {
        EventTime::Zoned { tzid, .. } => vec![Param::new("TZID", tzid.as_str())],
        EventTime::AllDay(_) => vec![Param::new("VALUE", "DATE")],
        EventTime::DateTime(_) | EventTime::Floating(_) => Vec::new(),
    };
    property(name, &params, &time.ics_value())
}

/// Parameters are rendered into the property name: the crate keeps them in
/// a hash map, which would not preserve their order.
fn property(name: &str, params: &[Param], value: &str) -> Property {
    let mut head = String::with_capacity(name.len() + params.len() * 16);
    head.push_str(name);
    for param in params {
        head.push(';');
        head.push_str(&param.name);
        head.push('=');
        head.push_str(&quote_param(&param.value));
    }
    Property::new(head.as_str(), value)
}

fn quote_param(value: &str) -> String {
    if value.contains([':', ';', ',']) && !value.starts_with('"') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ExtendedProperties, ExtendedProperty};
    use crate::ics::parse_feed;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn standup() -> CalendarEvent {
        CalendarEvent::new(
            "team/abc",
            EventTime::DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            "team",
        )
        .with_title("Standup")
    }

    fn render(event: &CalendarEvent) -> String {
        let mut w = IcsWriter::new("-//Test//Test//EN");
        w.event(event);
        w.finish()
    }

    #[test]
    fn header_uses_our_prodid_and_crlf() {
        let mut w = IcsWriter::new("-//Test//Test//EN");
        w.property("METHOD", "PUBLISH");
        let out = w.finish();

        assert!(out.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(out.contains("\r\nPRODID:-//Test//Test//EN\r\n"));
        assert_eq!(out.matches("PRODID:").count(), 1);
        assert!(out.contains("\r\nMETHOD:PUBLISH\r\n"));
        assert!(out.ends_with("END:VCALENDAR\r\n"));
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn events_have_no_generated_values() {
        let out = render(&standup());

        assert!(out.contains("\r\nUID:team/abc\r\n"));
        assert!(out.contains("\r\nDTSTAMP:20240101T100000Z\r\n"));
        assert_eq!(out.matches("UID:").count(), 1);
        assert_eq!(out.matches("DTSTAMP:").count(), 1);
        assert_eq!(out, render(&standup()));
    }

    #[test]
    fn text_values_are_escaped() {
        let out = render(&standup().with_location("Room 1, Floor 2; East\nWing"));
        assert!(out.contains("LOCATION:Room 1\\, Floor 2\\; East\\nWing\r\n"));
    }

    #[test]
    fn time_properties_keep_their_form() {
        let zoned = EventTime::Zoned {
            local: NaiveDate::from_ymd_opt(2024, 1, 3)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            tzid: "Europe/Paris".into(),
        };
        let out = render(&standup().with_end(zoned));
        assert!(out.contains("\r\nDTSTART:20240101T100000Z\r\n"));
        assert!(out.contains("\r\nDTEND;TZID=Europe/Paris:20240103T093000\r\n"));

        let all_day = CalendarEvent::new(
            "day",
            EventTime::AllDay(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            "team",
        );
        assert!(render(&all_day).contains("\r\nDTSTART;VALUE=DATE:20240102\r\n"));
    }

    #[test]
    fn parameters_keep_their_order() {
        let mut extended = ExtendedProperties::new();
        extended.push(
            ExtendedProperty::new("ATTENDEE", "mailto:ann@example.com").with_params(vec![
                Param::new("ROLE", "CHAIR"),
                Param::new("CN", "Ann"),
                Param::new("PARTSTAT", "ACCEPTED"),
            ]),
        );

        let out = render(&standup().with_extended(extended));

        assert!(out.contains(
            "\r\nATTENDEE;ROLE=CHAIR;CN=Ann;PARTSTAT=ACCEPTED:mailto:ann@example.com\r\n"
        ));
    }

    #[test]
    fn output_reads_back() {
        let mut extended = ExtendedProperties::new();
        extended.push(ExtendedProperty::new("X-COLOR", "#00ff00"));
        extended.push(ExtendedProperty::new("DTSTAMP", "20231215T080000Z"));
        let event = standup()
            .with_description("Line one\nLine two, with comma")
            .with_extended(extended);

        let feed = parse_feed(&render(&event), "merged").unwrap();

        assert_eq!(feed.skipped_blocks, 0);
        let back = &feed.events[0];
        assert_eq!(back.uid, event.uid);
        assert_eq!(back.start, event.start);
        assert_eq!(back.title, "Standup");
        assert_eq!(back.description, event.description);
        assert_eq!(back.extended.get("X-COLOR"), Some("#00ff00"));
        assert_eq!(back.extended.get("DTSTAMP"), Some("20231215T080000Z"));
    }

    #[test]
    fn params_with_separators_are_quoted() {
        assert_eq!(quote_param("Europe/Paris"), "Europe/Paris");
        assert_eq!(quote_param("GMT+01:00"), "\"GMT+01:00\"");
        assert_eq!(quote_param("\"a:b\""), "\"a:b\"");
    }
}
