//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`KeyTransition`]s without an input
//! device.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use pendant_core::keymap::KeyMapper;
use pendant_core::{KeyTransition, TransitionKind};
use tokio::sync::mpsc::{self, UnboundedSender};

use super::{CaptureError, KeyInputSource};

/// A mock implementation of [`KeyInputSource`] that allows tests to inject
/// transitions.
pub struct MockInputSource {
    device: PathBuf,
    sender: Mutex<Option<UnboundedSender<KeyTransition>>>,
}

impl MockInputSource {
    /// Creates a new mock input source.
    pub fn new() -> Self {
        Self {
            device: PathBuf::from("/dev/input/mock0"),
            sender: Mutex::new(None),
        }
    }

    /// Injects a transition, as if read from the device.
    ///
    /// Returns `false` if the source is not started or the receiver is gone.
    pub fn inject(&self, transition: KeyTransition) -> bool {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .is_some_and(|sender| sender.send(transition).is_ok())
    }

    /// Injects a transition of the key with Linux code `code`.
    pub fn inject_key(&self, code: u16, kind: TransitionKind) -> bool {
        self.inject(KeyTransition::new(
            KeyMapper::identity(code, None),
            kind,
            &self.device,
        ))
    }

    /// Injects a full press: press-start followed by press-end.
    pub fn tap(&self, code: u16) -> bool {
        self.inject_key(code, TransitionKind::PressStart)
            && self.inject_key(code, TransitionKind::PressEnd)
    }

    pub fn is_started(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Default for MockInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyInputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::UnboundedReceiver<KeyTransition>, CaptureError> {
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Drop the sender to close the channel
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn device_path(&self) -> &Path {
        &self.device
    }
}
