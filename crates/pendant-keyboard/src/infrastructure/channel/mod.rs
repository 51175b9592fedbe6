//! Command channel infrastructure: delivering commands to CNCjs.
//!
//! - **`cncjs`** – the socket.io connection to a CNCjs server.
//! - **`mock`**  – a recording channel for tests.
//!
//! Both implement [`CommandChannel`](crate::application::dispatch::CommandChannel).

pub mod cncjs;
pub mod mock;

pub use cncjs::{CncjsConnection, CncjsConnectionConfig, ConnectionError, ConnectionEvent};
pub use mock::{RecordingChannel, SentCommand};
