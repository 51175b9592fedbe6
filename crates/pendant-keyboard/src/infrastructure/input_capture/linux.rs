//! evdev input source for Linux.
//!
//! Opens one `/dev/input/event*` device, optionally grabs it so the keys do
//! not also reach the desktop, and streams its key events on a Tokio task.
//!
//! # Permissions (for beginners)
//!
//! Input devices are normally readable by `root` and the `input` group only.
//! Run the relay as a member of `input`, or add a udev rule for the pendant
//! keyboard.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use evdev::{Device, InputEventKind};
use pendant_core::KeyTransition;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{map_key_event, CaptureError, KeyInputSource};

/// Reads key transitions from one evdev device.
pub struct EvdevInputSource {
    path: PathBuf,
    exclusive: bool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl EvdevInputSource {
    /// Creates a source for the device at `path`.
    ///
    /// With `exclusive` set the device is grabbed on start.
    pub fn new(path: impl Into<PathBuf>, exclusive: bool) -> Self {
        Self {
            path: path.into(),
            exclusive,
            reader: Mutex::new(None),
        }
    }
}

impl KeyInputSource for EvdevInputSource {
    /// Opens the device and spawns the reader task.
    ///
    /// Must be called from within a Tokio runtime.
    fn start(&self) -> Result<mpsc::UnboundedReceiver<KeyTransition>, CaptureError> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if reader.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(CaptureError::AlreadyStarted);
        }

        let mut device = Device::open(&self.path).map_err(|source| CaptureError::Open {
            path: self.path.clone(),
            source,
        })?;
        info!(
            device = %self.path.display(),
            name = device.name().unwrap_or("unnamed"),
            "opened input device"
        );

        if self.exclusive {
            device.grab().map_err(|source| CaptureError::Grab {
                path: self.path.clone(),
                source,
            })?;
            debug!(device = %self.path.display(), "grabbed input device");
        }

        let stream = device
            .into_event_stream()
            .map_err(|source| CaptureError::Open {
                path: self.path.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let path = self.path.clone();
        *reader = Some(tokio::spawn(async move {
            if let Err(e) = read_device_events(stream, &path, tx).await {
                warn!(device = %path.display(), "input device reader ended: {e}");
            }
        }));
        Ok(rx)
    }

    /// Aborts the reader task.  Dropping the event stream closes the device
    /// and releases any grab.
    fn stop(&self) {
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            info!(device = %self.path.display(), "input device released");
        }
    }

    fn device_path(&self) -> &Path {
        &self.path
    }
}

async fn read_device_events(
    mut stream: evdev::EventStream,
    path: &Path,
    tx: UnboundedSender<KeyTransition>,
) -> std::io::Result<()> {
    loop {
        let event = stream.next_event().await?;

        if let InputEventKind::Key(key) = event.kind() {
            let driver_name = format!("{key:?}");
            let Some(transition) = map_key_event(key.code(), event.value(), Some(&driver_name), path)
            else {
                continue;
            };
            if tx.send(transition).is_err() {
                // Receiver dropped: the relay is shutting down.
                return Ok(());
            }
        }
    }
}
