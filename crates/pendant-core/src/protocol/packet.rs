//! Text codec for the CNCjs socket.io transport (engine.io protocol v3).
//!
//! Wire format: every websocket text frame is one engine.io packet.
//!
//! ```text
//! <engine type digit>[payload]
//!
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":5000}   open
//! 2 / 3                                                   ping / pong
//! 4<socket type digit>[/namespace,][ack id][json]          message
//! ```
//!
//! A socket.io event travels as `42["name",arg1,arg2,...]`.
//!
//! # Two layers of packets (for beginners)
//!
//! engine.io is the transport: it opens the session and keeps it alive with
//! ping/pong.  socket.io rides inside engine.io `message` packets and adds
//! named events.  Sending the CNCjs `write` event therefore means wrapping a
//! socket.io `EVENT` in an engine.io `MESSAGE`: `4` + `2` + JSON array.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while encoding or decoding a packet.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame was empty.
    #[error("empty packet")]
    Empty,

    /// The engine.io type digit is not a recognized value.
    #[error("unknown engine.io packet type: {0:?}")]
    UnknownEngineType(char),

    /// The socket.io type digit is not a recognized value.
    #[error("unknown socket.io packet type: {0:?}")]
    UnknownSocketType(char),

    /// Binary attachments are not used by CNCjs and are not supported.
    #[error("binary socket.io packets are not supported")]
    BinaryUnsupported,

    /// The JSON payload could not be parsed or has the wrong shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Session parameters sent by the server in the engine.io `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenHandshake {
    pub sid: String,
    /// Milliseconds between client pings.
    #[serde(rename = "pingInterval")]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a ping before closing the session.
    #[serde(rename = "pingTimeout")]
    pub ping_timeout: u64,
}

/// One engine.io packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// One socket.io packet, carried inside [`EnginePacket::Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    /// A named event with its JSON arguments.  Ack ids are not tracked.
    Event { name: String, args: Vec<Value> },
    /// Server-side error, e.g. a rejected access token.
    Error(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a packet into the text of one websocket frame.
///
/// # Examples
///
/// ```rust
/// use pendant_core::protocol::{encode_packet, EnginePacket, SocketPacket};
/// use serde_json::json;
///
/// let packet = EnginePacket::Message(SocketPacket::Event {
///     name: "write".to_string(),
///     args: vec![json!("/dev/ttyUSB0"), json!("M5;\n")],
/// });
/// assert_eq!(encode_packet(&packet), r#"42["write","/dev/ttyUSB0","M5;\n"]"#);
/// ```
pub fn encode_packet(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(handshake) => format!(
            "0{}",
            serde_json::json!({
                "sid": handshake.sid,
                "pingInterval": handshake.ping_interval,
                "pingTimeout": handshake.ping_timeout,
            })
        ),
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping(data) => format!("2{data}"),
        EnginePacket::Pong(data) => format!("3{data}"),
        EnginePacket::Message(socket) => format!("4{}", encode_socket(socket)),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

/// Shorthand for encoding a socket.io event frame.
pub fn encode_event(name: &str, args: Vec<Value>) -> String {
    encode_packet(&EnginePacket::Message(SocketPacket::Event {
        name: name.to_string(),
        args,
    }))
}

/// Decodes the text of one websocket frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the frame is empty, carries an unknown type
/// digit, or has a payload that is not the JSON the type requires.
pub fn decode_packet(frame: &str) -> Result<EnginePacket, ProtocolError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str::<OpenHandshake>(rest)
            .map(EnginePacket::Open)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(ProtocolError::UnknownEngineType(other)),
    }
}

// ── Socket layer ──────────────────────────────────────────────────────────────

fn encode_socket(packet: &SocketPacket) -> String {
    match packet {
        SocketPacket::Connect => "0".to_string(),
        SocketPacket::Disconnect => "1".to_string(),
        SocketPacket::Event { name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            format!("2{}", Value::Array(items))
        }
        SocketPacket::Error(message) => format!("4{}", Value::String(message.clone())),
    }
}

fn decode_socket(text: &str) -> Result<SocketPacket, ProtocolError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(ProtocolError::Empty)?;
    let body = strip_ack_id(strip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(SocketPacket::Connect),
        '1' => Ok(SocketPacket::Disconnect),
        // ACK packets carry replies to requests this client never makes.
        '2' | '3' => decode_event(body),
        '4' => Ok(SocketPacket::Error(match serde_json::from_str::<Value>(body) {
            Ok(Value::String(message)) => message,
            Ok(other) => other.to_string(),
            Err(_) => body.to_string(),
        })),
        '5' | '6' => Err(ProtocolError::BinaryUnsupported),
        other => Err(ProtocolError::UnknownSocketType(other)),
    }
}

fn decode_event(body: &str) -> Result<SocketPacket, ProtocolError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    let Value::Array(mut items) = value else {
        return Err(ProtocolError::MalformedPayload(
            "event payload is not an array".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(ProtocolError::MalformedPayload("event has no name".to_string()));
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(ProtocolError::MalformedPayload(format!(
                "event name must be a string, got {other}"
            )))
        }
    };
    Ok(SocketPacket::Event { name, args: items })
}

/// Drops a leading `/namespace,` if present.
fn strip_namespace(text: &str) -> &str {
    if text.starts_with('/') {
        match text.find(',') {
            Some(index) => &text[index + 1..],
            None => "",
        }
    } else {
        text
    }
}

/// Drops the numeric ack id that may precede the JSON payload.
fn strip_ack_id(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_digit())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_handshake() {
        // Arrange
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#;

        // Act
        let packet = decode_packet(frame).unwrap();

        // Assert
        assert_eq!(
            packet,
            EnginePacket::Open(OpenHandshake {
                sid: "abc".to_string(),
                ping_interval: 25000,
                ping_timeout: 5000,
            })
        );
    }

    #[test]
    fn test_decode_ping_pong_and_connect() {
        assert_eq!(decode_packet("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(decode_packet("3probe").unwrap(), EnginePacket::Pong("probe".to_string()));
        assert_eq!(
            decode_packet("40").unwrap(),
            EnginePacket::Message(SocketPacket::Connect)
        );
    }

    #[test]
    fn test_decode_event_with_arguments() {
        let packet = decode_packet(r#"42["serialport:read","ok"]"#).unwrap();

        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                name: "serialport:read".to_string(),
                args: vec![json!("ok")],
            })
        );
    }

    #[test]
    fn test_decode_event_skips_namespace_and_ack_id() {
        let packet = decode_packet(r#"42/cnc,17["startup",{"loadedControllers":["Grbl"]}]"#).unwrap();

        let EnginePacket::Message(SocketPacket::Event { name, args }) = packet else {
            panic!("expected event");
        };
        assert_eq!(name, "startup");
        assert_eq!(args[0]["loadedControllers"][0], "Grbl");
    }

    #[test]
    fn test_decode_error_packet() {
        let packet = decode_packet(r#"44"Not authorized""#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Error("Not authorized".to_string()))
        );
    }

    #[test]
    fn test_encode_open_event_for_serial_port() {
        let frame = encode_event(
            "open",
            vec![
                json!("/dev/ttyUSB0"),
                json!({ "baudrate": 115200, "controllerType": "Grbl" }),
            ],
        );

        assert!(frame.starts_with(r#"42["open","/dev/ttyUSB0",{"#));
        assert!(frame.contains(r#""baudrate":115200"#));
    }

    #[test]
    fn test_encode_keepalive() {
        assert_eq!(encode_packet(&EnginePacket::Ping(String::new())), "2");
        assert_eq!(encode_packet(&EnginePacket::Pong(String::new())), "3");
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert_eq!(decode_packet(""), Err(ProtocolError::Empty));
        assert_eq!(decode_packet("9"), Err(ProtocolError::UnknownEngineType('9')));
        assert_eq!(decode_packet("45"), Err(ProtocolError::BinaryUnsupported));
        assert!(matches!(
            decode_packet("42{}"),
            Err(ProtocolError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode_packet("42[]"),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }
}
