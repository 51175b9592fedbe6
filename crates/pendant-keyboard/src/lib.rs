//! pendant-keyboard library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! - [`application`] – bindings, configuration loading and the dispatch core.
//! - [`infrastructure`] – the input device, the CNCjs connection, access
//!   tokens and the settings file.

pub mod application;
pub mod infrastructure;
