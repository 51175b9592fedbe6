//! Pressed/released state of every key seen so far.

use std::collections::HashMap;

use super::key::{KeyIdentity, KeyRef};

/// Result of a key-state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
    /// The key has never been observed.
    Unknown,
}

impl KeyState {
    /// Returns `true` only for [`KeyState::Pressed`].
    pub fn is_pressed(self) -> bool {
        self == KeyState::Pressed
    }
}

/// Last known state of each key, keyed redundantly by name and by code.
///
/// Entries are created on first observation and never removed.  Both
/// entries of a key are written by the same [`update`](Self::update) call,
/// so they always agree.
#[derive(Debug, Default, Clone)]
pub struct KeyStateStore {
    states: HashMap<KeyRef, bool>,
}

impl KeyStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the state of `key` under both its name and its code.
    pub fn update(&mut self, key: &KeyIdentity, pressed: bool) {
        self.states.insert(key.name_ref(), pressed);
        self.states.insert(key.code_ref(), pressed);
    }

    /// Returns the last known state of a key addressed by name or code.
    pub fn query(&self, key: impl Into<KeyRef>) -> KeyState {
        match self.states.get(&key.into()) {
            Some(true) => KeyState::Pressed,
            Some(false) => KeyState::Released,
            None => KeyState::Unknown,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
