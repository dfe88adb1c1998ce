//! Client gateway error types.

use shared_types::CodecError;
use std::net::SocketAddr;

/// Wire-level errors: framing and message decoding.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Peer closed the stream in the middle of a frame
    #[error("connection closed mid-frame")]
    Truncated,

    /// Frame larger than the configured maximum
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Frame without an opcode
    #[error("empty frame")]
    EmptyFrame,

    /// Opcode not part of the client protocol
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// CHK_CMD body is not a 32-byte hash
    #[error("command hash must be 32 bytes, got {0}")]
    BadHashLength(usize),

    /// RESP_CMD body does not decode
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Socket error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Gateway-level errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Client listener bind error
    #[error("failed to bind client listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Errors seen by [`GatewayClient`](crate::client::GatewayClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Replica closed the connection
    #[error("connection closed by replica")]
    ConnectionClosed,

    /// Replica sent something other than RESP_CMD
    #[error("unexpected message with opcode 0x{0:02x}")]
    UnexpectedMessage(u8),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
