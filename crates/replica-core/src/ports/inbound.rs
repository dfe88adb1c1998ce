//! Driving port (Inbound API) used by the gateway and the runtime.

use crate::domain::{CoreResult, Decision};
use k256::ecdsa::VerifyingKey;
use shared_types::{Command, CommandCodec, CommandHash, CommittedCommand, ReplicaId};
use std::net::SocketAddr;
use std::sync::Arc;

/// What the client gateway and the orchestrator need from a replica core.
///
/// All calls are synchronous and total: they never block on consensus and
/// never fail because of a single command. Slow work is expressed through
/// the [`Decision`] returned by `async_decide`.
pub trait ReplicaCore: Send + Sync {
    /// Command wire format this core was built with.
    fn codec(&self) -> Arc<dyn CommandCodec>;

    /// Register a command for consideration by consensus.
    ///
    /// Idempotent per hash: a command already queued or decided is ignored.
    fn add_command(&self, hash: CommandHash, command: Command);

    /// One-shot future resolved when `hash` is decided.
    ///
    /// Every call returns an independent future; all of them resolve on the
    /// same decision. Already-decided hashes resolve immediately.
    fn async_decide(&self, hash: CommandHash) -> Decision;

    /// Look up a decided command that has not been pruned yet.
    fn find_cmd(&self, hash: &CommandHash) -> Option<CommittedCommand>;

    /// Register a peer. Only valid before [`ReplicaCore::start`].
    fn add_replica(&self, id: ReplicaId, addr: SocketAddr, public_key: VerifyingKey)
        -> CoreResult<()>;

    /// Number of registered peers.
    fn size(&self) -> usize;

    /// Begin the core's own protocol activity.
    fn start(&self) -> CoreResult<()>;

    /// Emit performance statistics to the log.
    fn print_stat(&self);

    /// Drop the oldest decided commands until at most `max_retained` remain.
    ///
    /// Returns the number of commands evicted.
    fn prune(&self, max_retained: usize) -> usize;
}
