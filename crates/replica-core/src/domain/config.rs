//! Static configuration of the replica core.

use k256::ecdsa::{SigningKey, VerifyingKey};
use shared_types::ReplicaId;
use std::fmt;
use std::time::Duration;

/// Default number of commands per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1;

/// Default ancestor-chain depth limit (`-1` = unlimited).
pub const DEFAULT_PARENT_LIMIT: i32 = -1;

/// Default interval of the stand-alone commit driver.
pub const DEFAULT_COMMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Core configuration.
#[derive(Clone)]
pub struct CoreConfig {
    /// Index of this replica in the replica list.
    pub replica_id: ReplicaId,
    /// Key this replica signs protocol messages with.
    pub signing_key: SigningKey,
    /// Maximum number of commands per block.
    pub block_size: usize,
    /// Maximum number of ancestors a proposal may reference.
    pub parent_limit: i32,
    /// Period of the stand-alone commit driver. `None` leaves commits to an
    /// external consensus protocol calling `deliver_commit`.
    pub commit_interval: Option<Duration>,
}

impl CoreConfig {
    /// Configuration with default tuning for replica `replica_id`.
    pub fn new(replica_id: ReplicaId, signing_key: SigningKey) -> Self {
        Self {
            replica_id,
            signing_key,
            block_size: DEFAULT_BLOCK_SIZE,
            parent_limit: DEFAULT_PARENT_LIMIT,
            commit_interval: Some(DEFAULT_COMMIT_INTERVAL),
        }
    }

    /// Public half of the signing key.
    pub fn public_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("replica_id", &self.replica_id)
            .field("signing_key", &"<redacted>")
            .field("block_size", &self.block_size)
            .field("parent_limit", &self.parent_limit)
            .field("commit_interval", &self.commit_interval)
            .finish()
    }
}
