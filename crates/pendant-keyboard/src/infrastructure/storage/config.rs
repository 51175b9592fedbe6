//! TOML-based settings for the relay.
//!
//! Reads `AppConfig` from the platform-appropriate settings file:
//! - Linux:    `~/.config/cncjs-pendant-keyboard/config.toml`
//! - Windows:  `%APPDATA%\CncjsPendantKeyboard\config.toml`
//! - macOS:    `~/Library/Application Support/CncjsPendantKeyboard/config.toml`
//!
//! Binding files are looked up in the `bindings` directory next to it.
//!
//! # What is TOML? (for beginners)
//!
//! TOML (Tom's Obvious Minimal Language) is a configuration file format designed
//! to be easy to read and write.  It looks similar to INI files but with more
//! data types.  Example:
//!
//! ```toml
//! [connection]
//! socket_address = "cnc.local"
//! port = "/dev/ttyACM0"
//!
//! [keyboard]
//! device = "by-id/usb-Telink_Wireless_Receiver-if01-event-kbd"
//! bindings = "numpad"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  Both sections
//! are optional, so an empty file (or none at all) gives the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Settings schema types ─────────────────────────────────────────────────────

/// Top-level settings stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub keyboard: KeyboardSettings,
}

/// CNCjs server and serial port settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSettings {
    /// Host name or IP address of the CNCjs server.
    #[serde(default = "default_socket_address")]
    pub socket_address: String,
    /// TCP port of the CNCjs server.
    #[serde(default = "default_socket_port")]
    pub socket_port: u16,
    /// Serial port of the machine controller, as known to the server.
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// Controller firmware: `Grbl`, `Smoothie`, `TinyG`, `Marlin`.
    #[serde(default = "default_controller_type")]
    pub controller_type: String,
    /// Secret used to sign the access token.  Usually left unset so that
    /// `CNCJS_SECRET` or `~/.cncrc` supplies it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Access token lifetime, e.g. `30d`, `12h`.
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: String,
    /// Seconds to wait before reconnecting after the connection drops.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

/// Input device and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyboardSettings {
    /// Device under `/dev/input/`, or an absolute path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Grab the device so its keys do not reach other programs.
    #[serde(default = "default_true")]
    pub exclusive: bool,
    /// Log every raw key transition.
    #[serde(default)]
    pub verbose: bool,
    /// Built-in configuration name, binding file name, or `.toml` path.
    #[serde(default = "default_bindings")]
    pub bindings: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_socket_address() -> String {
    "localhost".to_string()
}
fn default_socket_port() -> u16 {
    8000
}
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baudrate() -> u32 {
    115200
}
fn default_controller_type() -> String {
    "Grbl".to_string()
}
fn default_access_token_lifetime() -> String {
    "30d".to_string()
}
fn default_reconnect_interval() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_bindings() -> String {
    "default".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            socket_address: default_socket_address(),
            socket_port: default_socket_port(),
            port: default_port(),
            baudrate: default_baudrate(),
            controller_type: default_controller_type(),
            secret: None,
            access_token_lifetime: default_access_token_lifetime(),
            reconnect_interval_secs: default_reconnect_interval(),
        }
    }
}

impl Default for KeyboardSettings {
    fn default() -> Self {
        Self {
            device: None,
            exclusive: default_true(),
            verbose: false,
            bindings: default_bindings(),
            log_level: default_log_level(),
        }
    }
}

// ── Settings repository ───────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the settings file.
///
/// # Errors
///
/// Returns [`SettingsError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, SettingsError> {
    platform_config_dir().ok_or(SettingsError::NoPlatformConfigDir)
}

/// Resolves the full path to the settings file.
pub fn config_file_path() -> Result<PathBuf, SettingsError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] for file-system errors other than "not
/// found", and [`SettingsError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config base directory for this application.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CncjsPendantKeyboard"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("cncjs-pendant-keyboard"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("CncjsPendantKeyboard")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_defaults_match_cncjs_conventions() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.connection.socket_address, "localhost");
        assert_eq!(cfg.connection.socket_port, 8000);
        assert_eq!(cfg.connection.baudrate, 115200);
        assert_eq!(cfg.connection.controller_type, "Grbl");
        assert_eq!(cfg.connection.access_token_lifetime, "30d");
        assert_eq!(cfg.keyboard.bindings, "default");
        assert!(cfg.keyboard.exclusive);
        assert!(!cfg.keyboard.verbose);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[connection]
socket_address = "cnc.local"
baudrate = 250000

[keyboard]
device = "event3"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.connection.socket_address, "cnc.local");
        assert_eq!(cfg.connection.baudrate, 250000);
        assert_eq!(cfg.connection.socket_port, 8000);
        assert_eq!(cfg.keyboard.device.as_deref(), Some("event3"));
        assert_eq!(cfg.keyboard.log_level, "info");
    }

    #[test]
    fn test_unset_secret_is_not_serialized() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");

        assert!(!toml_str.contains("secret"), "None secret must be omitted");
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let dir = std::env::temp_dir().join(format!("pendant_settings_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(SettingsError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_paths_end_with_expected_names() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
