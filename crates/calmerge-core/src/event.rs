//! Calendar event model.
//!
//! A [`CalendarEvent`] is what the ICS reader produces for every usable
//! `VEVENT` block. Besides the recognized fields it carries every other
//! property of the block in an [`ExtendedProperties`] bag, so custom markers
//! such as `X-APPLE-CALENDAR-COLOR` or `URL` survive aggregation.

use serde::{Deserialize, Serialize};

use crate::ics::{escape_text, unescape_text};
use crate::time::EventTime;

/// A property parameter (`TZID=Europe/Paris`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Upper-cased parameter name.
    pub name: String,
    /// Value as written, including surrounding quotes if it had any.
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            value: value.into(),
        }
    }
}

/// A property that is not one of the recognized event fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperty {
    /// Upper-cased property name (`X-COLOR`, `RRULE`, ...).
    pub name: String,
    /// Parameters exactly as written in the feed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    /// Raw value, still in its iCalendar-escaped form.
    pub value: String,
}

impl ExtendedProperty {
    /// Creates a property without parameters.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// Builder: attach parameters.
    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }
}

/// Ordered bag of extended properties, keyed by property name.
///
/// Order and repetition are kept as in the source; `ATTENDEE` and `EXDATE`
/// may occur several times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtendedProperties(Vec<ExtendedProperty>);

impl ExtendedProperties {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a property, keeping any earlier one with the same name.
    pub fn push(&mut self, property: ExtendedProperty) {
        self.0.push(property);
    }

    /// Replaces every property called `name` with a single parameterless one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter().position(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(index) => {
                self.0[index].value = value;
                self.0[index].params.clear();
                let mut seen = false;
                self.0.retain(|p| {
                    if !p.name.eq_ignore_ascii_case(name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.0.push(ExtendedProperty::new(name, value)),
        }
    }

    /// Returns the raw value of the first property called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    /// Returns every property called `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ExtendedProperty> {
        self.0.iter().filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns true if at least one property is called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtendedProperty> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ExtendedProperty> for ExtendedProperties {
    fn from_iter<I: IntoIterator<Item = ExtendedProperty>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A calendar event read from one feed.
///
/// Events are built once by the reader and then passed by value through the
/// merge pipeline; each stage that changes something (rules, namespacing)
/// produces a new value through the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Event identifier. The feed's `UID` until the merger namespaces it.
    pub uid: String,
    /// Start time.
    pub start: EventTime,
    /// End time; open-ended events have none.
    pub end: Option<EventTime>,
    /// Event title (`SUMMARY`), empty when the feed has none.
    pub title: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Location.
    pub location: Option<String>,
    /// URL of the feed this event came from.
    pub source: String,
    /// Every other property of the `VEVENT`.
    pub extended: ExtendedProperties,
}

impl CalendarEvent {
    /// Creates an event with the required fields.
    pub fn new(uid: impl Into<String>, start: EventTime, source: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            start,
            end: None,
            title: String::new(),
            description: None,
            location: None,
            source: source.into(),
            extended: ExtendedProperties::new(),
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_extended(mut self, extended: ExtendedProperties) -> Self {
        self.extended = extended;
        self
    }

    /// The `RECURRENCE-ID` of an overridden instance, if any.
    pub fn recurrence_id(&self) -> Option<&str> {
        self.extended.get("RECURRENCE-ID")
    }

    /// Returns true if the event carries a recurrence rule.
    pub fn is_recurring(&self) -> bool {
        self.extended.contains("RRULE")
    }

    /// Reads a field by its iCalendar property name.
    ///
    /// `SUMMARY`, `DESCRIPTION`, `LOCATION` and `UID` map to the typed fields;
    /// any other name is looked up in the extended bag (raw value).
    pub fn field(&self, name: &str) -> Option<&str> {
        match name.to_ascii_uppercase().as_str() {
            "SUMMARY" => Some(self.title.as_str()),
            "DESCRIPTION" => self.description.as_deref(),
            "LOCATION" => self.location.as_deref(),
            "UID" => Some(self.uid.as_str()),
            _ => self.extended.get(name),
        }
    }

    /// Like [`field`](Self::field), but extended values are decoded to plain
    /// text and `DTSTART`/`DTEND` read as their iCalendar value.
    pub fn field_text(&self, name: &str) -> Option<String> {
        match name.to_ascii_uppercase().as_str() {
            "SUMMARY" | "DESCRIPTION" | "LOCATION" | "UID" => self.field(name).map(str::to_string),
            "DTSTART" => Some(self.start.ics_value()),
            "DTEND" => self.end.as_ref().map(EventTime::ics_value),
            _ => self.extended.get(name).map(unescape_text),
        }
    }

    /// Returns a copy with the field `name` set to the plain-text `value`.
    ///
    /// `DTSTART` and `DTEND` take a UTC, floating or date value; one that
    /// does not parse leaves the event unchanged.
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match name.to_ascii_uppercase().as_str() {
            "SUMMARY" => self.title = value,
            "DESCRIPTION" => self.description = Some(value),
            "LOCATION" => self.location = Some(value),
            "UID" => self.uid = value,
            "DTSTART" => {
                if let Some(start) = EventTime::parse(&value, None, false) {
                    self.start = start;
                }
            }
            "DTEND" => {
                if let Some(end) = EventTime::parse(&value, None, false) {
                    self.end = Some(end);
                }
            }
            _ => self.extended.set(name, escape_text(&value)),
        }
        self
    }
}
