//! Protocol module containing the CNCjs socket.io packet codec.

pub mod packet;

pub use packet::{
    decode_packet, encode_event, encode_packet, EnginePacket, OpenHandshake, ProtocolError,
    SocketPacket,
};
