//! Websocket connection to a CNCjs server.
//!
//! CNCjs speaks socket.io (engine.io protocol v3).  The connection:
//!
//! 1. opens `ws://{address}:{port}/socket.io/?EIO=3&transport=websocket&token={jwt}`,
//! 2. waits for the socket.io `CONNECT` packet, then emits
//!    `open(port, {baudrate, controllerType})` to open the serial port,
//! 3. keeps the session alive with engine.io pings at the interval the
//!    server advertised,
//! 4. reports serial port lifecycle events to the application,
//! 5. reconnects after `reconnect_interval` when the session ends.
//!
//! Architecture:
//! - One Tokio task owns the websocket for its whole life.
//! - [`CommandChannel::send`] hands encoded frames to that task through an
//!   unbounded channel and returns at once.  The sender only exists while a
//!   socket.io session is up; without it sends fail with
//!   [`ChannelError::NotConnected`] and nothing is queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pendant_core::protocol::{decode_packet, encode_event, encode_packet, EnginePacket, SocketPacket};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::application::dispatch::{ChannelError, CommandChannel};
use crate::infrastructure::storage::config::ConnectionSettings;

/// Ping interval used until the server's handshake says otherwise.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(25_000);

/// Errors that end one websocket session.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The websocket could not be opened or failed mid-session.
    #[error("websocket error: {0}")]
    Ws(#[from] WsError),
    /// The server answered with a socket.io error packet, e.g. a rejected
    /// access token.
    #[error("server rejected the session: {0}")]
    Rejected(String),
}

/// Configuration for the connection to the CNCjs server.
#[derive(Debug, Clone)]
pub struct CncjsConnectionConfig {
    /// Host name or IP address of the server.
    pub address: String,
    /// TCP port of the server.
    pub port: u16,
    /// Serial port of the controller, e.g. `/dev/ttyUSB0`.
    pub serial_port: String,
    pub baudrate: u32,
    /// Controller firmware: `Grbl`, `Smoothie`, `TinyG` or `Marlin`.
    pub controller_type: String,
    /// Signed access token appended to the URL.
    pub token: String,
    /// Delay between reconnect attempts.
    pub reconnect_interval: Duration,
}

impl CncjsConnectionConfig {
    /// Builds the configuration from the `[connection]` settings.
    pub fn from_settings(settings: &ConnectionSettings, token: String) -> Self {
        Self {
            address: settings.socket_address.clone(),
            port: settings.socket_port,
            serial_port: settings.port.clone(),
            baudrate: settings.baudrate,
            controller_type: settings.controller_type.clone(),
            token,
            reconnect_interval: Duration::from_secs(settings.reconnect_interval_secs),
        }
    }

    /// Returns the websocket URL of the socket.io endpoint.
    pub fn url(&self) -> String {
        format!(
            "ws://{}:{}/socket.io/?EIO=3&transport=websocket&token={}",
            self.address, self.port, self.token
        )
    }

    /// Returns the options argument of the `open` event.
    fn open_options(&self) -> Value {
        json!({
            "baudrate": self.baudrate,
            "controllerType": self.controller_type,
        })
    }
}

/// Events emitted by the connection to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The socket.io session is up; commands can be sent.
    Connected,
    /// The server opened the serial port.
    PortOpened { port: String, baudrate: u64 },
    /// The server could not open the serial port.
    PortError { port: String },
    /// One line of controller output, trimmed.
    SerialRead(String),
    /// The session ended.  A reconnect follows unless shutting down.
    Disconnected,
}

/// Maps a server event to a lifecycle event, if it is one.
pub fn lifecycle_event(name: &str, args: &[Value]) -> Option<ConnectionEvent> {
    let first = args.first();
    let port = || {
        first
            .and_then(|options| options.get("port"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    match name {
        "serialport:open" => Some(ConnectionEvent::PortOpened {
            port: port(),
            baudrate: first
                .and_then(|options| options.get("baudrate"))
                .and_then(Value::as_u64)
                .unwrap_or_default(),
        }),
        "serialport:error" => Some(ConnectionEvent::PortError { port: port() }),
        "serialport:read" => Some(ConnectionEvent::SerialRead(
            first.and_then(Value::as_str).unwrap_or_default().trim().to_string(),
        )),
        _ => None,
    }
}

/// Manages the socket.io session with the CNCjs server.
pub struct CncjsConnection {
    config: CncjsConnectionConfig,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl CncjsConnection {
    /// Creates a new (not yet connected) `CncjsConnection`.
    pub fn new(config: CncjsConnectionConfig) -> Self {
        Self {
            config,
            outbound: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CncjsConnectionConfig {
        &self.config
    }

    /// Returns `true` while a socket.io session is up.
    pub fn is_connected(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Starts the connection task and returns its event receiver.
    ///
    /// Runs a continuous reconnect loop until `running` is set to false.
    pub fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> mpsc::Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel(128);
        let this = Arc::clone(&self);

        tokio::spawn(async move {
            while running.load(Ordering::Relaxed) {
                match this.run_session(&tx).await {
                    Ok(()) => info!("connection to CNCjs server closed"),
                    Err(e) => warn!(
                        "connection to CNCjs server at {}:{} failed: {e}",
                        this.config.address, this.config.port
                    ),
                }

                if this.set_outbound(None) && tx.send(ConnectionEvent::Disconnected).await.is_err() {
                    break;
                }

                if running.load(Ordering::Relaxed) {
                    info!("reconnecting in {:?}", this.config.reconnect_interval);
                    time::sleep(this.config.reconnect_interval).await;
                }
            }
        });

        rx
    }

    /// Installs or removes the outbound sender.  Returns `true` if a
    /// sender was installed before.
    fn set_outbound(&self, sender: Option<mpsc::UnboundedSender<String>>) -> bool {
        let mut guard = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, sender).is_some()
    }

    /// Runs one websocket session until it closes.
    async fn run_session(&self, events: &mpsc::Sender<ConnectionEvent>) -> Result<(), ConnectionError> {
        debug!(address = %self.config.address, port = self.config.port, "connecting to CNCjs server");
        let (ws, _response) = connect_async(self.config.url()).await?;
        let (mut sink, mut stream) = ws.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let mut ping = ping_timer(DEFAULT_PING_INTERVAL);

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let text = match frame {
                        None => return Ok(()),
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(_))) => return Ok(()),
                        // tokio-tungstenite answers websocket pings itself.
                        Some(Ok(_)) => continue,
                    };

                    let packet = match decode_packet(&text) {
                        Ok(packet) => packet,
                        Err(e) => {
                            warn!("ignoring undecodable frame: {e}");
                            continue;
                        }
                    };

                    match packet {
                        EnginePacket::Open(handshake) => {
                            debug!(sid = %handshake.sid, ping_interval_ms = handshake.ping_interval, "engine.io session opened");
                            ping = ping_timer(Duration::from_millis(handshake.ping_interval));
                        }
                        EnginePacket::Ping(data) => {
                            sink.send(WsMessage::Text(encode_packet(&EnginePacket::Pong(data)))).await?;
                        }
                        EnginePacket::Message(SocketPacket::Connect) => {
                            self.set_outbound(Some(out_tx.clone()));
                            info!("connected to CNCjs server at {}:{}", self.config.address, self.config.port);
                            if events.send(ConnectionEvent::Connected).await.is_err() {
                                return Ok(());
                            }
                            if let Err(e) = self.send("open", &self.config.serial_port, vec![self.config.open_options()]) {
                                error!("failed to request serial port {}: {e}", self.config.serial_port);
                            }
                        }
                        EnginePacket::Message(SocketPacket::Event { name, args }) => {
                            match lifecycle_event(&name, &args) {
                                Some(event) => {
                                    if events.send(event).await.is_err() {
                                        return Ok(());
                                    }
                                }
                                None => debug!(event = %name, "ignoring server event"),
                            }
                        }
                        EnginePacket::Message(SocketPacket::Error(reason)) => {
                            return Err(ConnectionError::Rejected(reason));
                        }
                        EnginePacket::Message(SocketPacket::Disconnect) | EnginePacket::Close => {
                            return Ok(());
                        }
                        EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
                    }
                }
                Some(frame) = out_rx.recv() => {
                    sink.send(WsMessage::Text(frame)).await?;
                }
                _ = ping.tick() => {
                    sink.send(WsMessage::Text(encode_packet(&EnginePacket::Ping(String::new())))).await?;
                }
            }
        }
    }
}

impl CommandChannel for CncjsConnection {
    fn send(&self, event: &str, port: &str, args: Vec<Value>) -> Result<(), ChannelError> {
        let guard = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(ChannelError::NotConnected);
        };

        let mut payload = Vec::with_capacity(args.len() + 1);
        payload.push(Value::String(port.to_string()));
        payload.extend(args);

        tx.send(encode_event(event, payload))
            .map_err(|_| ChannelError::NotConnected)
    }
}

/// Creates a ping timer whose first tick is one period from now.
fn ping_timer(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(100));
    time::interval_at(Instant::now() + period, period)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CncjsConnectionConfig {
        CncjsConnectionConfig::from_settings(&ConnectionSettings::default(), "tkn".to_string())
    }

    #[test]
    fn test_url_carries_engine_version_and_token() {
        assert_eq!(
            config().url(),
            "ws://localhost:8000/socket.io/?EIO=3&transport=websocket&token=tkn"
        );
    }

    #[test]
    fn test_open_options_shape() {
        assert_eq!(
            config().open_options(),
            json!({ "baudrate": 115200, "controllerType": "Grbl" })
        );
    }

    #[test]
    fn test_send_while_disconnected_is_rejected() {
        // Arrange
        let conn = CncjsConnection::new(config());

        // Act
        let result = conn.send("write", "/dev/ttyUSB0", vec![json!("M5;\n")]);

        // Assert
        assert!(matches!(result, Err(ChannelError::NotConnected)));
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_send_while_connected_queues_encoded_frame() {
        // Arrange
        let conn = CncjsConnection::new(config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        conn.set_outbound(Some(tx));

        // Act
        conn.send("write", "/dev/ttyUSB0", vec![json!("G91;\n")]).unwrap();

        // Assert
        assert_eq!(rx.try_recv().unwrap(), r#"42["write","/dev/ttyUSB0","G91;\n"]"#);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_send_after_session_task_ended_is_rejected() {
        let conn = CncjsConnection::new(config());
        let (tx, rx) = mpsc::unbounded_channel();
        conn.set_outbound(Some(tx));
        drop(rx);

        let result = conn.send("command", "COM3", vec![json!("reset")]);

        assert!(matches!(result, Err(ChannelError::NotConnected)));
    }

    #[test]
    fn test_lifecycle_events_from_server_events() {
        assert_eq!(
            lifecycle_event("serialport:open", &[json!({ "port": "COM3", "baudrate": 115200 })]),
            Some(ConnectionEvent::PortOpened {
                port: "COM3".to_string(),
                baudrate: 115200
            })
        );
        assert_eq!(
            lifecycle_event("serialport:error", &[json!({ "port": "COM3" })]),
            Some(ConnectionEvent::PortError { port: "COM3".to_string() })
        );
        assert_eq!(
            lifecycle_event("serialport:read", &[json!("ok\r\n")]),
            Some(ConnectionEvent::SerialRead("ok".to_string()))
        );
        assert_eq!(lifecycle_event("controller:state", &[]), None);
    }

    #[test]
    fn test_lifecycle_event_tolerates_missing_fields() {
        assert_eq!(
            lifecycle_event("serialport:open", &[]),
            Some(ConnectionEvent::PortOpened {
                port: String::new(),
                baudrate: 0
            })
        );
    }
}
