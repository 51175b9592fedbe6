//! Application layer of the pendant keyboard relay.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `pendant-core`) and the infrastructure (input devices,
//! websockets, files).
//!
//! Code in this layer:
//!
//! - **Orchestrates** domain objects to fulfil a user goal (e.g., "when the
//!   operator presses KP8, jog the machine one step in +Y").
//! - **Depends on abstractions** (the [`dispatch::CommandChannel`] trait)
//!   rather than on the websocket client, so the infrastructure can be
//!   swapped without changing this code.
//! - **Contains no OS calls and no network I/O**.  Only the configuration
//!   loader touches the file system, to read binding files.
//!
//! # Sub-modules
//!
//! - **`bindings`** – Handlers, the raw configuration tree, validation and
//!   the ordered binding table.
//!
//! - **`context`**  – What a handler can see and do for one transition.
//!
//! - **`dispatch`** – The dispatch core.  It runs on every key transition.
//!
//! - **`configs`**  – Built-in configurations and TOML binding files.

pub mod bindings;
pub mod configs;
pub mod context;
pub mod dispatch;
