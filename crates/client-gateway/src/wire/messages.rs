//! Client protocol messages.

use crate::domain::error::ProtocolError;
use serde::{Deserialize, Serialize};
use shared_types::{CommandHash, Finality};

/// Message type bytes.
pub mod opcodes {
    /// Client submits a command.
    pub const REQ_CMD: u8 = 0x04;
    /// Replica reports the finality of a command.
    pub const RESP_CMD: u8 = 0x05;
    /// Client asks for the finality of a command hash.
    pub const CHK_CMD: u8 = 0x06;
}

/// Body of a RESP_CMD frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub hash: CommandHash,
    pub finality: Finality,
}

/// A decoded client protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// REQ_CMD: raw command bytes, decoded later with the core's codec
    RequestCommand(Vec<u8>),
    /// CHK_CMD
    CheckCommand(CommandHash),
    /// RESP_CMD
    Response(CommandResponse),
}

impl ClientMessage {
    pub fn opcode(&self) -> u8 {
        match self {
            Self::RequestCommand(_) => opcodes::REQ_CMD,
            Self::CheckCommand(_) => opcodes::CHK_CMD,
            Self::Response(_) => opcodes::RESP_CMD,
        }
    }

    /// Encode to `[opcode][body]`, without the length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = vec![self.opcode()];
        match self {
            Self::RequestCommand(raw) => bytes.extend_from_slice(raw),
            Self::CheckCommand(hash) => bytes.extend_from_slice(hash),
            Self::Response(response) => {
                let body = bincode::serialize(response)
                    .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
                bytes.extend(body);
            }
        }
        Ok(bytes)
    }

    /// Decode a frame produced by [`read_frame`](super::read_frame).
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let (&opcode, body) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;

        match opcode {
            opcodes::REQ_CMD => Ok(Self::RequestCommand(body.to_vec())),
            opcodes::CHK_CMD => {
                let hash: CommandHash = body
                    .try_into()
                    .map_err(|_| ProtocolError::BadHashLength(body.len()))?;
                Ok(Self::CheckCommand(hash))
            }
            opcodes::RESP_CMD => {
                let response = bincode::deserialize(body)
                    .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?;
                Ok(Self::Response(response))
            }
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_command_layout() {
        let frame = ClientMessage::CheckCommand([0xab; 32]).encode().unwrap();
        assert_eq!(frame.len(), 33);
        assert_eq!(frame[0], opcodes::CHK_CMD);
        assert_eq!(&frame[1..], &[0xab; 32]);
    }

    #[test]
    fn test_request_body_is_passed_through() {
        let frame = [opcodes::REQ_CMD, 1, 2, 3];
        assert_eq!(
            ClientMessage::decode(&frame).unwrap(),
            ClientMessage::RequestCommand(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_rejection_response_decodes() {
        let message = ClientMessage::Response(CommandResponse {
            hash: [7; 32],
            finality: Finality::rejected(),
        });
        let decoded = ClientMessage::decode(&message.encode().unwrap()).unwrap();
        match decoded {
            ClientMessage::Response(response) => {
                assert_eq!(response.hash, [7; 32]);
                assert!(response.finality.is_rejected());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_short_hash_is_rejected() {
        let frame = [opcodes::CHK_CMD, 1, 2, 3];
        assert!(matches!(
            ClientMessage::decode(&frame),
            Err(ProtocolError::BadHashLength(3))
        ));
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(
            ClientMessage::decode(&[0x42]),
            Err(ProtocolError::UnknownOpcode(0x42))
        ));
        assert!(matches!(
            ClientMessage::decode(&[]),
            Err(ProtocolError::EmptyFrame)
        ));
    }

    #[test]
    fn test_truncated_response_is_malformed() {
        let frame = [opcodes::RESP_CMD, 1, 2];
        assert!(matches!(
            ClientMessage::decode(&frame),
            Err(ProtocolError::MalformedResponse(_))
        ));
    }
}
