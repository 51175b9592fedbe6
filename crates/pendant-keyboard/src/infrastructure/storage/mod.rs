//! Storage infrastructure: settings file persistence.
//!
//! The `config` sub-module handles:
//!
//! - Reading the TOML settings file from the platform-appropriate directory.
//! - Providing sensible defaults when the file does not exist yet (first run).
//! - Locating the settings file, whose directory also holds binding files.

pub mod config;
