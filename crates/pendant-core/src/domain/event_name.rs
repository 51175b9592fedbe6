//! Event names: the keys bindings are registered under.
//!
//! An event name is a key reference with an optional transition label.
//! Written out it is either the bare key (`KEY_ESC`, `1`) or the key plus a
//! suffix (`KEY_ESC:keypress`, `1:keyup`).
//!
//! Every transition is dispatched under exactly four names, from the most
//! specific to the least specific:
//!
//! | # | Form       | Example             |
//! |---|------------|---------------------|
//! | 1 | `name:T`   | `KEY_UP:keypress`   |
//! | 2 | `name`     | `KEY_UP`            |
//! | 3 | `code:T`   | `103:keypress`      |
//! | 4 | `code`     | `103`               |
//!
//! All four are dispatched; the order only fixes the order in which matching
//! bindings run and are logged.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::key::{KeyRef, KeyTransition, TransitionLabel};

/// Error returned when a binding pattern cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventNameError {
    #[error("event name is empty")]
    Empty,
    #[error("event name \"{0}\" has no key before the ':'")]
    MissingKey(String),
    #[error("event name \"{pattern}\": {reason}")]
    UnknownTransition { pattern: String, reason: String },
}

/// A dispatchable event name: a key plus an optional transition label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventName {
    pub key: KeyRef,
    pub label: Option<TransitionLabel>,
}

impl EventName {
    /// An event name that matches every transition of `key`.
    pub fn any(key: impl Into<KeyRef>) -> Self {
        Self {
            key: key.into(),
            label: None,
        }
    }

    /// An event name that matches only `label` transitions of `key`.
    pub fn with_label(key: impl Into<KeyRef>, label: TransitionLabel) -> Self {
        Self {
            key: key.into(),
            label: Some(label),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{}:{}", self.key, label),
            None => write!(f, "{}", self.key),
        }
    }
}

impl FromStr for EventName {
    type Err = EventNameError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        if pattern.is_empty() {
            return Err(EventNameError::Empty);
        }
        match pattern.split_once(':') {
            None => Ok(EventName::any(KeyRef::parse(pattern))),
            Some(("", _)) => Err(EventNameError::MissingKey(pattern.to_string())),
            Some((key, suffix)) => {
                let label = suffix.parse::<TransitionLabel>().map_err(|reason| {
                    EventNameError::UnknownTransition {
                        pattern: pattern.to_string(),
                        reason,
                    }
                })?;
                Ok(EventName::with_label(KeyRef::parse(key), label))
            }
        }
    }
}

/// Returns the four names `transition` is dispatched under, in dispatch order.
pub fn event_names(transition: &KeyTransition) -> [EventName; 4] {
    let label = transition.kind.label();
    let name = transition.key.name_ref();
    let code = transition.key.code_ref();
    [
        EventName::with_label(name.clone(), label),
        EventName::any(name),
        EventName::with_label(code.clone(), label),
        EventName::any(code),
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::{KeyIdentity, TransitionKind};

    fn transition(kind: TransitionKind) -> KeyTransition {
        KeyTransition::new(KeyIdentity::new("KEY_ESC", 1), kind, "/dev/input/event0")
    }

    #[test]
    fn test_event_names_are_name_then_code_specific_first() {
        // Act
        let names = event_names(&transition(TransitionKind::Repeat));

        // Assert
        let rendered: Vec<String> = names.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["KEY_ESC:keypress", "KEY_ESC", "1:keypress", "1"]);
    }

    #[test]
    fn test_event_names_follow_transition_kind() {
        let up = event_names(&transition(TransitionKind::PressEnd));
        let down = event_names(&transition(TransitionKind::PressStart));

        assert_eq!(up[0].to_string(), "KEY_ESC:keyup");
        assert_eq!(down[2].to_string(), "1:keydown");
        // The bare names do not depend on the kind.
        assert_eq!(up[1], down[1]);
        assert_eq!(up[3], down[3]);
    }

    #[test]
    fn test_parse_bare_name_and_code() {
        assert_eq!("KEY_ESC".parse::<EventName>(), Ok(EventName::any("KEY_ESC")));
        assert_eq!("1".parse::<EventName>(), Ok(EventName::any(1u16)));
    }

    #[test]
    fn test_parse_with_suffix() {
        let parsed: EventName = "KEY_ESC:keypress".parse().unwrap();
        assert_eq!(parsed, EventName::with_label("KEY_ESC", TransitionLabel::KeyPress));

        let parsed: EventName = "103:keyup".parse().unwrap();
        assert_eq!(parsed, EventName::with_label(103u16, TransitionLabel::KeyUp));
    }

    #[test]
    fn test_parsed_pattern_equals_resolved_name() {
        let names = event_names(&transition(TransitionKind::Repeat));
        let pattern: EventName = "KEY_ESC:keypress".parse().unwrap();

        assert!(names.contains(&pattern));
    }

    #[test]
    fn test_zero_padded_code_is_not_the_resolved_code_name() {
        let names = event_names(&transition(TransitionKind::Repeat));
        let pattern: EventName = "01:keypress".parse().unwrap();

        assert_eq!(pattern.to_string(), "01:keypress");
        assert!(!names.contains(&pattern));
    }

    #[test]
    fn test_parse_rejects_unknown_suffix_and_empty_input() {
        assert!(matches!(
            "KEY_ESC:keypess".parse::<EventName>(),
            Err(EventNameError::UnknownTransition { .. })
        ));
        assert_eq!("".parse::<EventName>(), Err(EventNameError::Empty));
        assert!(matches!(
            ":keyup".parse::<EventName>(),
            Err(EventNameError::MissingKey(_))
        ));
    }
}
