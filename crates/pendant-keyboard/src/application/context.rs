//! The context a handler receives for one key transition.

use std::path::Path;

use pendant_core::{
    CommandList, GlobalState, KeyRef, KeyState, KeyStateStore, KeyTransition, TransitionKind,
    TransitionLabel,
};
use serde_json::Value;

use super::dispatch::{ChannelError, CommandChannel};

/// Terminator appended to every written command unless disabled.
pub const LINE_ENDING: &str = ";\n";

/// Capabilities and metadata handed to a handler.
///
/// Built once per transition by the dispatch core and shared by every
/// handler that matches it, so a handler sees the global-state changes of
/// the handlers that ran before it.  It never outlives the dispatch call.
pub struct HandlerContext<'a> {
    global: &'a mut GlobalState,
    key_states: &'a KeyStateStore,
    channel: &'a dyn CommandChannel,
    port: &'a str,
    transition: &'a KeyTransition,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        global: &'a mut GlobalState,
        key_states: &'a KeyStateStore,
        channel: &'a dyn CommandChannel,
        port: &'a str,
        transition: &'a KeyTransition,
    ) -> Self {
        Self {
            global,
            key_states,
            channel,
            port,
            transition,
        }
    }

    // ── Global state ──────────────────────────────────────────────────────────

    pub fn global(&self) -> &GlobalState {
        self.global
    }

    pub fn global_mut(&mut self) -> &mut GlobalState {
        self.global
    }

    // ── Key state ─────────────────────────────────────────────────────────────

    /// Returns the last known state of any key, by name or by code.
    pub fn key_state(&self, key: impl Into<KeyRef>) -> KeyState {
        self.key_states.query(key)
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Sends `event` to the controller server with the active port as the
    /// first argument.
    ///
    /// The send is not acknowledged; an `Ok` only means the command was
    /// handed to the connection.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> Result<(), ChannelError> {
        self.channel.send(event, self.port, args)
    }

    /// Writes one command or a list of commands, each terminated with `;\n`.
    pub fn write(&self, commands: impl Into<CommandList>) -> Result<(), ChannelError> {
        self.write_with(commands, true)
    }

    /// Writes commands as independent `write` sends, in list order.
    ///
    /// Every command is attempted even if an earlier send failed; the first
    /// failure is returned.
    pub fn write_with(
        &self,
        commands: impl Into<CommandList>,
        append_line_ending: bool,
    ) -> Result<(), ChannelError> {
        let mut first_error = None;
        for command in commands.into() {
            let line = if append_line_ending {
                format!("{command}{LINE_ENDING}")
            } else {
                command
            };
            if let Err(e) = self.emit("write", vec![Value::String(line)]) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ── Transition metadata ───────────────────────────────────────────────────

    /// The serial port commands are sent to.
    pub fn port(&self) -> &str {
        self.port
    }

    pub fn key_name(&self) -> &str {
        &self.transition.key.name
    }

    pub fn key_code(&self) -> u16 {
        self.transition.key.code
    }

    pub fn kind(&self) -> TransitionKind {
        self.transition.kind
    }

    pub fn label(&self) -> TransitionLabel {
        self.transition.kind.label()
    }

    pub fn device(&self) -> &Path {
        &self.transition.device
    }

    /// The key state after this transition: `false` only for a release.
    pub fn value(&self) -> bool {
        self.transition.kind.is_pressed()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
