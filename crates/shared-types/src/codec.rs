//! # Command Codec
//!
//! The application decides how commands look on the wire. The core and the
//! gateway only need three capabilities, bundled in [`CommandCodec`] and
//! injected at construction time.

use crate::entities::{Command, CommandHash};
use crate::errors::CodecError;
use sha2::{Digest, Sha256};

/// Application-supplied command wire format.
pub trait CommandCodec: Send + Sync {
    /// Encode a command into its canonical byte form.
    fn encode(&self, command: &Command) -> Result<Vec<u8>, CodecError>;

    /// Decode a command from bytes received from a client or a peer.
    fn decode(&self, bytes: &[u8]) -> Result<Command, CodecError>;

    /// Content address of a command: SHA-256 of its canonical encoding.
    fn hash(&self, command: &Command) -> Result<CommandHash, CodecError> {
        let encoded = self.encode(command)?;
        Ok(Sha256::digest(&encoded).into())
    }
}

/// Default codec: bincode over the serde form of [`Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCommandCodec;

impl CommandCodec for BincodeCommandCodec {
    fn encode(&self, command: &Command) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(command).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Command, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}
