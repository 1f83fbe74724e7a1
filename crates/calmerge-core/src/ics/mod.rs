//! iCalendar (RFC 5545) reading and writing on top of the `icalendar` crate.
//!
//! The reader is forgiving: a broken `VEVENT` costs only that event, never
//! the rest of the feed. The writer produces byte-stable output, with no
//! wall-clock values of its own.

mod reader;
mod writer;

pub use reader::{ParsedFeed, TimeZoneBlock, parse_feed};
pub use writer::IcsWriter;

/// Decodes an iCalendar TEXT value.
///
/// Unknown escape sequences such as `\:` are kept verbatim.
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(c @ ('\\' | ';' | ',')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Encodes plain text as an iCalendar TEXT value.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_escaping() {
        assert_eq!(unescape_text(r"a\, b\; c\nd\\e"), "a, b; c\nd\\e");
        assert_eq!(unescape_text(r"odd\:escape"), r"odd\:escape");
        assert_eq!(escape_text("a, b; c\nd\\e"), r"a\, b\; c\nd\\e");
    }
}
