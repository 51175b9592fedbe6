//! Input capture infrastructure: reading key transitions from a device.
//!
//! On Linux the relay reads the kernel's input-event interface through the
//! `evdev` crate.  Key events are mapped to [`KeyTransition`]s on a Tokio
//! task and delivered through an unbounded channel; the channel is the only
//! buffer between the device and the dispatch core.
//!
//! # Linux event values (for beginners)
//!
//! Every `EV_KEY` event carries a value: `1` when the key goes down, `2` for
//! each auto-repeat while it is held, and `0` when it is released.  Those
//! map to press-start, repeat and press-end.
//!
//! # Testability
//!
//! The `KeyInputSource` trait allows tests to inject synthetic transitions
//! without an input device.

use std::path::{Path, PathBuf};

use pendant_core::keymap::KeyMapper;
use pendant_core::{KeyTransition, TransitionKind};
use tokio::sync::mpsc;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod linux;

/// Directory relative device names are resolved against.
pub const INPUT_DIR: &str = "/dev/input";

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open input device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to grab input device {path} exclusively: {source}")]
    Grab {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("input source has already been started")]
    AlreadyStarted,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Trait abstracting key transition production.
///
/// The production implementation reads an evdev device; tests use
/// [`mock::MockInputSource`].
pub trait KeyInputSource: Send + Sync {
    /// Starts reading and returns a receiver for transitions.
    ///
    /// The receiver closes when the source stops or the device goes away.
    fn start(&self) -> Result<mpsc::UnboundedReceiver<KeyTransition>, CaptureError>;
    /// Stops reading and releases the device.
    fn stop(&self);
    /// The device transitions are read from.
    fn device_path(&self) -> &Path;
}

/// Resolves a configured device name to a path.
///
/// Absolute paths are kept; anything else is taken relative to
/// `/dev/input`, so `by-id/usb-...-event-kbd` works as well as `event3`.
pub fn resolve_device_path(device: &str) -> PathBuf {
    let path = Path::new(device);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(INPUT_DIR).join(path)
    }
}

/// Maps one key event to a transition.
///
/// `driver_name` is the name the device driver reports for the code and is
/// used only when the key table has no entry.  Values other than 0, 1 and 2
/// are not key transitions and yield `None`.
pub fn map_key_event(
    code: u16,
    value: i32,
    driver_name: Option<&str>,
    device: &Path,
) -> Option<KeyTransition> {
    let kind = match value {
        0 => TransitionKind::PressEnd,
        1 => TransitionKind::PressStart,
        2 => TransitionKind::Repeat,
        _ => return None,
    };
    Some(KeyTransition::new(
        KeyMapper::identity(code, driver_name),
        kind,
        device,
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_values_map_to_transition_kinds() {
        let device = Path::new("/dev/input/event0");

        assert_eq!(
            map_key_event(1, 1, None, device).map(|t| t.kind),
            Some(TransitionKind::PressStart)
        );
        assert_eq!(
            map_key_event(1, 2, None, device).map(|t| t.kind),
            Some(TransitionKind::Repeat)
        );
        assert_eq!(
            map_key_event(1, 0, None, device).map(|t| t.kind),
            Some(TransitionKind::PressEnd)
        );
        assert!(map_key_event(1, 7, None, device).is_none());
    }

    #[test]
    fn test_mapped_transition_carries_name_code_and_device() {
        let t = map_key_event(103, 1, Some("KEY_UP"), Path::new("/dev/input/event5")).unwrap();

        assert_eq!(t.key.name, "KEY_UP");
        assert_eq!(t.key.code, 103);
        assert_eq!(t.device, PathBuf::from("/dev/input/event5"));
    }

    #[test]
    fn test_resolve_device_path() {
        assert_eq!(
            resolve_device_path("by-id/usb-pad-event-kbd"),
            PathBuf::from("/dev/input/by-id/usb-pad-event-kbd")
        );
        assert_eq!(resolve_device_path("/tmp/dev"), PathBuf::from("/tmp/dev"));
    }
}
