//! Rewrite rules applied to every merged event.
//!
//! A rule fires when all of its conditions hold, then runs its actions in
//! order. Fields are iCalendar property names: `SUMMARY`, `DESCRIPTION`,
//! `LOCATION`, `UID`, `DTSTART` and `DTEND` address the typed event fields,
//! anything else the extended properties (including `X-CALENDAR-SOURCE`).
//!
//! Rules run before events are namespaced, so `UID` is the source's own
//! value and a rewritten one still goes through the de-duplication.

use calmerge_core::{CalendarEvent, EventTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    /// The field's text contains the value (case-sensitive). A missing field
    /// reads as empty.
    #[serde(alias = "contains")]
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub field: String,
    pub op: ActionOp,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOp {
    /// Replace the field.
    #[serde(alias = "set")]
    Set,
    /// Put the value in front of the current text.
    #[serde(alias = "prepend")]
    Prepend,
}

/// Fields an action may not write.
const READ_ONLY_FIELDS: &[&str] = &["BEGIN", "END", "X-CALENDAR-SOURCE"];

impl Condition {
    pub fn matches(&self, event: &CalendarEvent) -> bool {
        let text = event.field_text(&self.field).unwrap_or_default();
        match self.op {
            ConditionOp::Contains => text.contains(&self.value),
        }
    }
}

impl Action {
    pub fn apply(&self, event: CalendarEvent) -> CalendarEvent {
        let value = match self.op {
            ActionOp::Set => self.value.clone(),
            ActionOp::Prepend => {
                let current = event.field_text(&self.field).unwrap_or_default();
                format!("{}{}", self.value, current)
            }
        };
        event.with_field(&self.field, value)
    }

    fn validate(&self) -> Result<(), String> {
        let field = self.field.to_ascii_uppercase();
        if field.is_empty() {
            return Err("action field must not be empty".into());
        }
        if READ_ONLY_FIELDS.contains(&field.as_str()) {
            return Err(format!("field {field} cannot be rewritten"));
        }
        if field == "DTSTART" || field == "DTEND" {
            if self.op == ActionOp::Prepend {
                return Err(format!("{field} only supports Set"));
            }
            if EventTime::parse(&self.value, None, false).is_none() {
                return Err(format!("'{}' is not a valid {field} value", self.value));
            }
        }
        Ok(())
    }
}

impl Rule {
    /// Checks that every action can be applied to any event.
    ///
    /// # Errors
    ///
    /// Returns a message naming the rule and the first bad action.
    pub fn validate(&self) -> Result<(), String> {
        for action in &self.actions {
            action
                .validate()
                .map_err(|e| format!("rule '{}': {}", self.name, e))?;
        }
        Ok(())
    }

    /// Returns true when every condition holds. A rule without conditions
    /// matches everything.
    pub fn matches(&self, event: &CalendarEvent) -> bool {
        self.conditions.iter().all(|c| c.matches(event))
    }

    /// Applies the rule if it matches.
    pub fn apply(&self, event: CalendarEvent) -> CalendarEvent {
        if !self.matches(&event) {
            return event;
        }
        debug!(rule = %self.name, event = %event.uid, "Applying rule");
        self.actions.iter().fold(event, |ev, action| action.apply(ev))
    }
}

/// Runs `rules` in order over `event`.
pub fn apply_rules(rules: &[Rule], event: CalendarEvent) -> CalendarEvent {
    rules.iter().fold(event, |ev, rule| rule.apply(ev))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(title: &str) -> CalendarEvent {
        CalendarEvent::new(
            "e1",
            EventTime::DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            "https://example.com/a.ics",
        )
        .with_title(title)
    }

    fn rule(conditions: Vec<Condition>, actions: Vec<Action>) -> Rule {
        Rule {
            name: "test".into(),
            conditions,
            actions,
        }
    }

    fn contains(field: &str, value: &str) -> Condition {
        Condition {
            field: field.into(),
            op: ConditionOp::Contains,
            value: value.into(),
        }
    }

    fn action(field: &str, op: ActionOp, value: &str) -> Action {
        Action {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[test]
    fn prepend_when_all_conditions_match() {
        let r = rule(
            vec![contains("SUMMARY", "Standup")],
            vec![action("SUMMARY", ActionOp::Prepend, "[team] ")],
        );

        assert_eq!(r.apply(event("Daily Standup")).title, "[team] Daily Standup");
        assert_eq!(r.apply(event("Planning")).title, "Planning");
    }

    #[test]
    fn every_condition_must_hold() {
        let r = rule(
            vec![contains("SUMMARY", "Standup"), contains("LOCATION", "Room")],
            vec![action("LOCATION", ActionOp::Set, "Online")],
        );

        let untouched = r.apply(event("Standup"));
        assert!(untouched.location.is_none());

        let changed = r.apply(event("Standup").with_location("Room 4"));
        assert_eq!(changed.location.as_deref(), Some("Online"));
    }

    #[test]
    fn set_on_extended_property() {
        let r = rule(vec![], vec![action("X-COLOR", ActionOp::Set, "#00ff00")]);
        let ev = r.apply(event("Anything"));
        assert_eq!(ev.extended.get("X-COLOR"), Some("#00ff00"));
    }

    #[test]
    fn rules_run_in_order() {
        let rules = vec![
            rule(vec![], vec![action("SUMMARY", ActionOp::Set, "B")]),
            rule(
                vec![contains("SUMMARY", "B")],
                vec![action("SUMMARY", ActionOp::Prepend, "A")],
            ),
        ];
        assert_eq!(apply_rules(&rules, event("x")).title, "AB");
    }

    #[test]
    fn deserializes_config_form() {
        let json = r#"{
            "name": "tag",
            "conditions": [{"field": "SUMMARY", "op": "Contains", "value": "x"}],
            "actions": [{"field": "SUMMARY", "op": "prepend", "value": "y"}]
        }"#;
        let r: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(r.conditions[0].op, ConditionOp::Contains);
        assert_eq!(r.actions[0].op, ActionOp::Prepend);
    }

    #[test]
    fn set_dtstart_moves_the_typed_start() {
        let r = rule(vec![], vec![action("DTSTART", ActionOp::Set, "20240105T090000Z")]);
        assert!(r.validate().is_ok());

        let ev = r.apply(event("x"));
        assert_eq!(
            ev.start,
            EventTime::DateTime(Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap())
        );
        assert!(ev.extended.get("DTSTART").is_none());
    }

    #[test]
    fn validation_rejects_unwritable_actions() {
        let bad = [
            action("DTSTART", ActionOp::Set, "next week"),
            action("dtend", ActionOp::Prepend, "2024"),
            action("X-CALENDAR-SOURCE", ActionOp::Set, "other"),
            action("END", ActionOp::Set, "VCALENDAR"),
            action("", ActionOp::Set, "x"),
        ];
        for a in bad {
            let err = rule(vec![], vec![a.clone()]).validate().unwrap_err();
            assert!(err.starts_with("rule 'test': "), "{err}");
        }

        let ok = rule(
            vec![],
            vec![
                action("DTEND", ActionOp::Set, "20240102"),
                action("UID", ActionOp::Set, "same"),
                action("SUMMARY", ActionOp::Prepend, "[x] "),
            ],
        );
        assert!(ok.validate().is_ok());
    }
}
