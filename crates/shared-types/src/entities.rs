//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Commands**: `Command`, `CommandSignature`, `CommittedCommand`
//! - **Decisions**: `Finality`
//! - **Replicas**: `ReplicaId`, `PeerDescriptor`

use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

// =============================================================================
// CLUSTER A: COMMANDS
// =============================================================================

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Content address of a command.
pub type CommandHash = Hash;

/// Identifier of the block that committed a command.
pub type BlockId = Hash;

/// The all-zero hash, used for "no block".
pub const ZERO_HASH: Hash = [0u8; 32];

/// Abbreviated hex form of a hash for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..5])
}

/// Signature attached to a command by its submitter.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSignature {
    /// SEC1-encoded secp256k1 public key of the signer.
    pub public_key: Vec<u8>,
    /// Compact (r || s) ECDSA signature over SHA-256(payload).
    #[serde_as(as = "Bytes")]
    pub signature: [u8; 64],
}

/// A client command as submitted to the replica.
///
/// The payload is opaque to the replica; only the codec and the signature
/// check look inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Application-defined content.
    pub payload: Vec<u8>,
    /// Optional submitter signature.
    pub signature: Option<CommandSignature>,
}

impl Command {
    /// Create an unsigned command.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            signature: None,
        }
    }

    /// Whether the submitter attached a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// A command whose decision is known.
///
/// Produced only by the core, once per command, when the committing block is
/// delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedCommand {
    /// Content address of the command.
    pub hash: CommandHash,
    /// The command itself.
    pub command: Arc<Command>,
    /// Where consensus placed it.
    pub finality: Finality,
}

// =============================================================================
// CLUSTER B: DECISIONS
// =============================================================================

/// Outcome of a command.
///
/// Three shapes are meaningful:
///
/// | height | block_id | meaning                                   |
/// |--------|----------|-------------------------------------------|
/// | `-1`   | zero     | rejected by the gateway before consensus  |
/// | `0`    | zero     | no decision available (unknown / pending) |
/// | `>= 1` | block    | committed at `height` in block `block_id` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Finality {
    /// Height of the committing block, or `-1` for a rejection.
    pub height: i64,
    /// Committing block, zero when not committed.
    pub block_id: BlockId,
}

impl Finality {
    /// Height sentinel for commands rejected before consensus.
    pub const REJECTED_HEIGHT: i64 = -1;

    /// Finality of a command committed at `height` in `block_id`.
    pub fn committed(height: i64, block_id: BlockId) -> Self {
        Self { height, block_id }
    }

    /// Negative finality returned for commands that fail verification.
    pub fn rejected() -> Self {
        Self {
            height: Self::REJECTED_HEIGHT,
            block_id: ZERO_HASH,
        }
    }

    /// Whether this is the rejection sentinel.
    pub fn is_rejected(&self) -> bool {
        self.height == Self::REJECTED_HEIGHT
    }

    /// Whether this records an actual commit.
    pub fn is_committed(&self) -> bool {
        self.height > 0
    }
}

impl fmt::Display for Finality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rejected() {
            write!(f, "rejected")
        } else if self.is_committed() {
            write!(f, "height={} block={}", self.height, short_hex(&self.block_id))
        } else {
            write!(f, "undecided")
        }
    }
}

// =============================================================================
// CLUSTER C: REPLICAS
// =============================================================================

/// Index of a replica in the configured replica list.
pub type ReplicaId = u16;

/// A peer as registered with the core before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    /// Position in the replica list.
    pub id: ReplicaId,
    /// Replica-to-replica listening address.
    pub addr: SocketAddr,
    /// Key the peer signs protocol messages with.
    pub public_key: VerifyingKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_finality_is_undecided() {
        let fin = Finality::default();
        assert_eq!(fin.height, 0);
        assert_eq!(fin.block_id, ZERO_HASH);
        assert!(!fin.is_committed());
        assert!(!fin.is_rejected());
    }

    #[test]
    fn test_rejected_finality() {
        let fin = Finality::rejected();
        assert_eq!(fin.height, -1);
        assert_eq!(fin.block_id, ZERO_HASH);
        assert!(fin.is_rejected());
        assert!(!fin.is_committed());
        assert_eq!(fin.to_string(), "rejected");
    }

    #[test]
    fn test_committed_finality_display() {
        let fin = Finality::committed(7, [0xB7; 32]);
        assert!(fin.is_committed());
        assert_eq!(fin.to_string(), "height=7 block=b7b7b7b7b7");
    }

    #[test]
    fn test_short_hex() {
        let mut hash = ZERO_HASH;
        hash[0] = 0xAB;
        hash[4] = 0x01;
        assert_eq!(short_hex(&hash), "ab00000001");
    }
}
