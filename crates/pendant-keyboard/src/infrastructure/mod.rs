//! Infrastructure layer of the pendant keyboard relay.
//!
//! Contains OS-facing adapters: the input device reader, the CNCjs
//! websocket connection, access-token minting and settings storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pendant_core`, but MUST NOT be imported by the `application` or domain
//! layers outside of their tests.

pub mod auth;
pub mod channel;
pub mod input_capture;
pub mod storage;
