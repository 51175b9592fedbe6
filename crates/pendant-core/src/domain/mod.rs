//! Domain entities for the pendant keyboard relay.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code has **no** imports from OS
//! APIs, network libraries, or device drivers, and can be compiled and tested
//! on any platform without any external setup.
//!
//! Here the domain describes what a key transition *is*, which names it is
//! dispatched under, and the state that survives between transitions:
//!
//! - [`key`] – key identities and the three transition kinds.
//! - [`key_state`] – the pressed/released store, keyed by name and by code.
//! - [`event_name`] – the four candidate names of every transition.
//! - [`global_state`] – the open key-value store shared by all handlers.

pub mod event_name;
pub mod global_state;
pub mod key;
pub mod key_state;
