//! Error types for the replica core.

use shared_types::{CodecError, ReplicaId};

/// Replica core error types
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Core already started")]
    AlreadyStarted,

    #[error("Replica {0} registered twice")]
    DuplicateReplica(ReplicaId),

    #[error("Replica {0} advertises a public key that does not match the local signing key")]
    KeyMismatch(ReplicaId),

    #[error("Commit at height {height} does not extend tip at height {tip}")]
    StaleCommit { height: i64, tip: i64 },

    #[error("Commit driver needs a running tokio runtime")]
    NoRuntime,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

pub type CoreResult<T> = Result<T, CoreError>;
