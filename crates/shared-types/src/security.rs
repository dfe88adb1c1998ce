//! # Command Signatures
//!
//! secp256k1 ECDSA over the command payload, using the `k256` crate.
//!
//! ## Security Properties
//!
//! - Signatures are compact `(r || s)`, SHA-256 prehash of the payload.
//! - High-S signatures are rejected by `k256` verification (no malleability).
//! - An unsigned command carries no integrity claim and passes verification;
//!   the submitter decides whether to sign.

use crate::entities::{Command, CommandSignature};
use crate::errors::VerificationError;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Sign `command`'s payload with `key`, replacing any previous signature.
pub fn sign_command(command: &mut Command, key: &SigningKey) {
    let signature: Signature = key.sign(&command.payload);
    let mut compact = [0u8; 64];
    compact.copy_from_slice(&signature.to_bytes());

    command.signature = Some(CommandSignature {
        public_key: key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec(),
        signature: compact,
    });
}

/// Check the signature attached to `command`, if any.
pub fn verify_command(command: &Command) -> Result<(), VerificationError> {
    let Some(attached) = &command.signature else {
        return Ok(());
    };

    let key = VerifyingKey::from_sec1_bytes(&attached.public_key)
        .map_err(|_| VerificationError::InvalidPublicKey)?;
    let signature = Signature::from_slice(&attached.signature)
        .map_err(|_| VerificationError::InvalidSignatureEncoding)?;

    key.verify(&command.payload, &signature)
        .map_err(|_| VerificationError::SignatureMismatch)
}
