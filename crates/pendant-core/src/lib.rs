//! # pendant-core
//!
//! Shared library for the CNCjs pendant keyboard relay containing the key
//! event model, event-name resolution, the shared global state, G-code
//! formatting helpers, and the CNCjs socket.io packet codec.
//!
//! It has zero dependencies on OS APIs, input devices, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! The relay turns a spare keyboard (typically a wireless numeric keypad)
//! into a pendant for a CNC machine.  Every key transition read from the
//! device is mapped through a user configuration to commands that are sent
//! to a CNCjs server, which drives the machine controller (Grbl, Smoothie,
//! ...) over a serial port.
//!
//! This crate (`pendant-core`) is the pure foundation.  It defines:
//!
//! - **`domain`** – Key identities, transitions, the key-state store, the
//!   event names a transition is dispatched under, and the global state
//!   shared by all handlers.
//!
//! - **`keymap`** – The Linux input-event key table (`KEY_ESC` = 1, ...)
//!   used to give every numeric key code its symbolic name.
//!
//! - **`gcode`** – Small helpers that build G-code command lists (relative
//!   and absolute jogging, value clamping).
//!
//! - **`protocol`** – The text framing CNCjs speaks over its WebSocket:
//!   engine.io packets carrying socket.io events.

pub mod domain;
pub mod gcode;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pendant_core::KeyTransition` instead of `pendant_core::domain::key::KeyTransition`.
pub use domain::event_name::{event_names, EventName, EventNameError};
pub use domain::global_state::GlobalState;
pub use domain::key::{KeyIdentity, KeyRef, KeyTransition, TransitionKind, TransitionLabel};
pub use domain::key_state::{KeyState, KeyStateStore};
pub use gcode::{absolute_movement, limit_value, relative_movement, CommandList, Movement};
pub use protocol::packet::{
    decode_packet, encode_event, encode_packet, EnginePacket, ProtocolError, SocketPacket,
};
