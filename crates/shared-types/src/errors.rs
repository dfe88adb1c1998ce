//! # Error Types
//!
//! Errors raised while handling commands outside of consensus.

use thiserror::Error;

/// Errors from a [`CommandCodec`](crate::CommandCodec).
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Bytes do not decode into a command.
    #[error("Malformed command: {0}")]
    Malformed(String),

    /// Command could not be encoded.
    #[error("Command encoding failed: {0}")]
    Encode(String),
}

/// Reasons a command fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Public key is not a valid SEC1 secp256k1 point.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Signature bytes are not a valid ECDSA signature.
    #[error("Invalid signature encoding")]
    InvalidSignatureEncoding,

    /// Signature does not match payload and key.
    #[error("Signature mismatch")]
    SignatureMismatch,
}
