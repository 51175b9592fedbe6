//! Key identities and key transitions.
//!
//! A physical key is known under two names at once: its symbolic name from
//! the Linux input-event table (`KEY_ESC`) and its numeric code (`1`).
//! Configurations may refer to a key by either form, so both are carried on
//! every [`KeyTransition`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A reference to a key by one of its two identities.
///
/// Used as the lookup key of the key-state store and as the key part of an
/// event name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRef {
    /// Symbolic name, e.g. `KEY_KP8`.
    Name(String),
    /// Numeric key code, e.g. `72`.
    Code(u16),
}

impl KeyRef {
    /// Interprets `text` as a key reference.
    ///
    /// Text that is the canonical decimal form of a `u16` is a numeric code;
    /// anything else is a symbolic name.  `"103"` addresses key 103, while
    /// `"0103"` stays a name and never matches a device event.
    pub fn parse(text: &str) -> Self {
        match text.parse::<u16>() {
            Ok(code) if code.to_string() == text => KeyRef::Code(code),
            _ => KeyRef::Name(text.to_string()),
        }
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRef::Name(name) => f.write_str(name),
            KeyRef::Code(code) => write!(f, "{code}"),
        }
    }
}

impl From<&str> for KeyRef {
    fn from(text: &str) -> Self {
        KeyRef::parse(text)
    }
}

impl From<String> for KeyRef {
    fn from(text: String) -> Self {
        KeyRef::parse(&text)
    }
}

impl From<u16> for KeyRef {
    fn from(code: u16) -> Self {
        KeyRef::Code(code)
    }
}

/// Both identities of a physical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyIdentity {
    /// Symbolic name, e.g. `KEY_UP`.
    pub name: String,
    /// Numeric key code, e.g. `103`.
    pub code: u16,
}

impl KeyIdentity {
    /// Creates an identity from a symbolic name and a numeric code.
    pub fn new(name: impl Into<String>, code: u16) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    /// Returns the symbolic-name reference of this key.
    pub fn name_ref(&self) -> KeyRef {
        KeyRef::Name(self.name.clone())
    }

    /// Returns the numeric-code reference of this key.
    pub fn code_ref(&self) -> KeyRef {
        KeyRef::Code(self.code)
    }
}

/// The three kinds of transition a key can go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// The key went down.
    PressStart,
    /// The key came back up.
    PressEnd,
    /// The key is held and the device produced an auto-repeat.
    Repeat,
}

impl TransitionKind {
    /// Returns the canonical label bindings use for this kind.
    pub fn label(self) -> TransitionLabel {
        match self {
            TransitionKind::PressStart => TransitionLabel::KeyDown,
            TransitionKind::PressEnd => TransitionLabel::KeyUp,
            TransitionKind::Repeat => TransitionLabel::KeyPress,
        }
    }

    /// Returns the key state after this transition: `false` only for a release.
    pub fn is_pressed(self) -> bool {
        self != TransitionKind::PressEnd
    }
}

/// Canonical transition label used as the suffix of an event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionLabel {
    KeyUp,
    KeyDown,
    KeyPress,
}

impl TransitionLabel {
    /// Returns the label text, e.g. `"keypress"`.
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionLabel::KeyUp => "keyup",
            TransitionLabel::KeyDown => "keydown",
            TransitionLabel::KeyPress => "keypress",
        }
    }
}

impl fmt::Display for TransitionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyup" => Ok(TransitionLabel::KeyUp),
            "keydown" => Ok(TransitionLabel::KeyDown),
            "keypress" => Ok(TransitionLabel::KeyPress),
            other => Err(format!(
                "unknown transition \"{other}\" (expected keyup, keydown or keypress)"
            )),
        }
    }
}

/// One key event as read from the input device.
///
/// Produced once per hardware event and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyIdentity,
    pub kind: TransitionKind,
    /// Path of the device the event came from, e.g. `/dev/input/event3`.
    pub device: PathBuf,
}

impl KeyTransition {
    /// Creates a transition.
    pub fn new(key: KeyIdentity, kind: TransitionKind, device: impl Into<PathBuf>) -> Self {
        Self {
            key,
            kind,
            device: device.into(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ref_parse_digits_is_code() {
        assert_eq!(KeyRef::parse("103"), KeyRef::Code(103));
    }

    #[test]
    fn test_key_ref_parse_name_is_name() {
        assert_eq!(KeyRef::parse("KEY_UP"), KeyRef::Name("KEY_UP".to_string()));
    }

    #[test]
    fn test_key_ref_parse_out_of_range_number_stays_name() {
        // Larger than u16::MAX cannot be a key code.
        assert_eq!(KeyRef::parse("70000"), KeyRef::Name("70000".to_string()));
    }

    #[test]
    fn test_key_ref_parse_leading_zero_stays_name() {
        assert_eq!(KeyRef::parse("0103"), KeyRef::Name("0103".to_string()));
        assert_eq!(KeyRef::parse("+103"), KeyRef::Name("+103".to_string()));
        assert_eq!(KeyRef::parse("0"), KeyRef::Code(0));
    }

    #[test]
    fn test_key_ref_display_matches_parse_input() {
        assert_eq!(KeyRef::parse("KEY_1").to_string(), "KEY_1");
        assert_eq!(KeyRef::parse("2").to_string(), "2");
    }

    #[test]
    fn test_transition_kind_labels() {
        assert_eq!(TransitionKind::PressStart.label(), TransitionLabel::KeyDown);
        assert_eq!(TransitionKind::PressEnd.label(), TransitionLabel::KeyUp);
        assert_eq!(TransitionKind::Repeat.label(), TransitionLabel::KeyPress);
    }

    #[test]
    fn test_only_press_end_releases_the_key() {
        assert!(TransitionKind::PressStart.is_pressed());
        assert!(TransitionKind::Repeat.is_pressed());
        assert!(!TransitionKind::PressEnd.is_pressed());
    }

    #[test]
    fn test_transition_label_from_str_rejects_typos() {
        assert_eq!("keypress".parse::<TransitionLabel>(), Ok(TransitionLabel::KeyPress));
        assert!("keypess".parse::<TransitionLabel>().is_err());
    }
}
