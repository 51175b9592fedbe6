//! Recording command channel for unit testing.
//!
//! Records every successful send so tests can assert exactly what a handler
//! put on the wire.  A disconnected recorder rejects sends the same way the
//! real connection does while it is down.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::application::dispatch::{ChannelError, CommandChannel};

/// One recorded send.
#[derive(Debug, Clone, PartialEq)]
pub struct SentCommand {
    pub event: String,
    pub port: String,
    pub args: Vec<Value>,
}

/// A [`CommandChannel`] that records sends instead of transmitting them.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentCommand>>,
    attempts: AtomicUsize,
    disconnected: AtomicBool,
}

impl RecordingChannel {
    /// Creates a connected recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder that rejects every send with
    /// [`ChannelError::NotConnected`].
    pub fn disconnected() -> Self {
        let channel = Self::default();
        channel.set_connected(false);
        channel
    }

    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Returns a snapshot of the successful sends, oldest first.
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of send calls, including rejected ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CommandChannel for RecordingChannel {
    fn send(&self, event: &str, port: &str, args: Vec<Value>) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(ChannelError::NotConnected);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentCommand {
                event: event.to_string(),
                port: port.to_string(),
                args,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_channel_records_in_order() {
        // Arrange
        let channel = RecordingChannel::new();

        // Act
        channel.send("write", "COM1", vec![json!("G0 X1;\n")]).unwrap();
        channel.send("command", "COM1", vec![json!("reset")]).unwrap();

        // Assert
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].event, "write");
        assert_eq!(sent[1].args, vec![json!("reset")]);
        assert_eq!(channel.attempts(), 2);
    }

    #[test]
    fn test_disconnected_channel_rejects_and_counts() {
        let channel = RecordingChannel::disconnected();

        let result = channel.send("write", "COM1", vec![json!("M5")]);

        assert!(matches!(result, Err(ChannelError::NotConnected)));
        assert_eq!(channel.attempts(), 1);
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn test_reconnected_channel_records_again() {
        let channel = RecordingChannel::disconnected();
        channel.set_connected(true);

        channel.send("write", "COM1", vec![]).unwrap();

        assert_eq!(channel.sent().len(), 1);
    }
}
