//! DispatchCore: turns key transitions into handler invocations.
//!
//! This is the heart of the relay.  For every transition read from the input
//! device it:
//!
//! 1. records the new key state (pressed unless the key was released),
//! 2. builds one [`HandlerContext`] for the transition,
//! 3. resolves the four event names (`name:T`, `name`, `code:T`, `code`),
//! 4. runs every binding registered under each name, in that order and in
//!    registration order within a name.
//!
//! A handler that fails (returns an error or panics) is logged with its
//! pattern and description; the remaining handlers still run.
//!
//! # Architecture
//!
//! The core depends only on the [`CommandChannel`] trait and on domain
//! types.  The websocket connection is injected at construction time, so
//! the core is fully unit-testable with a recording channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use pendant_core::{event_names, EventName, GlobalState, KeyStateStore, KeyTransition};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use super::bindings::{BindingTable, Configuration};
use super::context::HandlerContext;

// ── Command channel ───────────────────────────────────────────────────────────

/// Error type for command sends.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The connection to the server is down; the command was dropped.
    #[error("not connected to the CNCjs server")]
    NotConnected,
    /// The connection task has shut down.
    #[error("connection closed")]
    Closed,
    /// The command could not be framed for the wire.
    #[error("failed to encode command: {0}")]
    Encode(String),
}

/// Outgoing side of the connection to the controller server.
///
/// `send` must not block: implementations hand the command to a background
/// task and return.  Infrastructure uses the socket.io connection; tests use
/// a recording double.
pub trait CommandChannel: Send + Sync {
    /// Sends `event` with `port` as its first argument followed by `args`.
    fn send(&self, event: &str, port: &str, args: Vec<Value>) -> Result<(), ChannelError>;
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// A handler failed while dispatching a transition.  Never fatal.
#[derive(Debug, Error)]
#[error("handler for [{pattern}] ({description}) failed: {message}")]
pub struct HandlerExecutionError {
    pub pattern: String,
    pub description: String,
    pub message: String,
    /// `true` if the handler panicked rather than returning an error.
    pub panicked: bool,
}

/// Options fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Log every raw transition, matched or not.
    pub verbose: bool,
}

/// Outcome of dispatching one transition.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Patterns of the bindings that were invoked, in invocation order.
    pub invoked: Vec<String>,
    pub failures: Vec<HandlerExecutionError>,
}

/// The dispatch core.
///
/// Owns the binding table, the global state and the key-state store.
/// Dispatch is synchronous: [`on_raw_transition`](Self::on_raw_transition)
/// returns only after every matching handler has run.
pub struct DispatchCore {
    bindings: BindingTable,
    global: GlobalState,
    key_states: KeyStateStore,
    channel: Arc<dyn CommandChannel>,
    port: String,
    options: DispatchOptions,
}

impl DispatchCore {
    /// Creates a dispatch core for a validated configuration.
    pub fn new(
        config: Configuration,
        channel: Arc<dyn CommandChannel>,
        port: impl Into<String>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            bindings: config.bindings,
            global: config.global,
            key_states: KeyStateStore::new(),
            channel,
            port: port.into(),
            options,
        }
    }

    /// Dispatches one key transition to every matching binding.
    pub fn on_raw_transition(&mut self, transition: &KeyTransition) -> DispatchReport {
        let value = transition.kind.is_pressed();
        self.key_states.update(&transition.key, value);

        if self.options.verbose {
            info!(
                "{}",
                format_verbose_line(
                    transition.kind.label().as_str(),
                    transition.key.code,
                    &transition.key.name
                )
            );
        }

        let mut report = DispatchReport::default();
        let names = event_names(transition);
        let mut ctx = HandlerContext::new(
            &mut self.global,
            &self.key_states,
            self.channel.as_ref(),
            &self.port,
            transition,
        );

        for name in &names {
            for binding in self.bindings.lookup(name) {
                info!("{}", format_trigger_line(&binding.pattern, &binding.description));
                report.invoked.push(binding.pattern.to_string());

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| binding.handler.call(&mut ctx)));
                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some((format!("{e:#}"), false)),
                    Err(payload) => Some((panic_message(payload.as_ref()), true)),
                };
                if let Some((message, panicked)) = failure {
                    let err = HandlerExecutionError {
                        pattern: binding.pattern.to_string(),
                        description: binding.description.clone(),
                        message,
                        panicked,
                    };
                    error!(
                        pattern = %err.pattern,
                        description = %err.description,
                        panicked = err.panicked,
                        "{err}"
                    );
                    report.failures.push(err);
                }
            }
        }
        report
    }

    pub fn global(&self) -> &GlobalState {
        &self.global
    }

    pub fn key_states(&self) -> &KeyStateStore {
        &self.key_states
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {text}")
    } else {
        "panicked".to_string()
    }
}

// ── Log formatting ────────────────────────────────────────────────────────────

/// Formats the line logged before a binding runs.
///
/// `Triggered Event: [KEY_UP:keypress]         - Set Spindel ON`
pub fn format_trigger_line(pattern: &EventName, description: &str) -> String {
    format!("Triggered Event: {:<25} - {}", format!("[{pattern}]"), description)
}

/// Formats the line listing one binding at startup.
///
/// `Binding: [KEY_KP8:keydown]         - Jog Y+`
pub fn format_binding_line(pattern: &EventName, description: &str) -> String {
    format!("Binding: {:<25} - {}", format!("[{pattern}]"), description)
}

/// Formats the verbose line logged for every raw transition.
///
/// `Event: keydown    => #103 [KEY_UP]`
pub fn format_verbose_line(label: &str, code: u16, name: &str) -> String {
    format!("Event: {label:<10} => #{code:>3} [{name}]")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
