//! The open key-value store shared by every handler.
//!
//! A configuration seeds it once (e.g. `{"step": 1, "vacuum": false}`) and
//! handlers read and overwrite entries for the rest of the process.  Values
//! are untyped JSON so a configuration can keep whatever it needs there.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mutable state shared across all handler invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalState {
    entries: Map<String, Value>,
}

impl GlobalState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns the value under `key` as a number, if it is one.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    /// Returns the value under `key` as a boolean, if it is one.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Flips the boolean under `key` and returns the new value.
    ///
    /// A missing or non-boolean entry counts as `false`, so the first toggle
    /// yields `true`.
    pub fn toggle(&mut self, key: &str) -> bool {
        let next = !self.get_bool(key).unwrap_or(false);
        self.entries.insert(key.to_string(), Value::Bool(next));
        next
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }
}

impl From<Map<String, Value>> for GlobalState {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
