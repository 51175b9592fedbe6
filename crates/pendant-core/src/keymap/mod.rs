//! Key code translation for Linux input devices.
//!
//! The canonical key identity is the pair (symbolic name, numeric code) of
//! the Linux input subsystem.  Input sources report the numeric code; this
//! module supplies the matching name.

pub mod linux_input;

use crate::domain::key::KeyIdentity;

/// Unified key mapper for building [`KeyIdentity`] values.
pub struct KeyMapper;

impl KeyMapper {
    /// Returns the symbolic name for a Linux key code, if known.
    pub fn name_of(code: u16) -> Option<&'static str> {
        linux_input::code_to_name(code)
    }

    /// Returns the Linux key code for a symbolic name, if known.
    pub fn code_of(name: &str) -> Option<u16> {
        linux_input::name_to_code(name)
    }

    /// Builds the identity of a key code.
    ///
    /// `fallback_name` is used when the table has no entry, typically the
    /// name the device driver reports.  Without either the key is named
    /// `UNKNOWN_<code>` so it can still be bound by code.
    pub fn identity(code: u16, fallback_name: Option<&str>) -> KeyIdentity {
        let name = match (Self::name_of(code), fallback_name) {
            (Some(name), _) => name.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => format!("UNKNOWN_{code}"),
        };
        KeyIdentity::new(name, code)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
