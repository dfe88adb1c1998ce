//! One-shot decision futures.
//!
//! A [`Decision`] is the consumer half of a `tokio::sync::oneshot` channel
//! keyed by command hash. The core keeps the sender and resolves it exactly
//! once, from whatever task or thread learns about the commit. Whoever
//! awaits the decision runs its continuation on its own task.

use shared_types::{short_hex, BlockId, CommandHash, CommittedCommand};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// The core dropped a decision without resolving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("decision for {} abandoned by the core", short_hex(.0))]
pub struct DecisionAbandoned(pub CommandHash);

/// Future resolving to the decided command.
#[derive(Debug)]
pub struct Decision {
    hash: CommandHash,
    rx: oneshot::Receiver<CommittedCommand>,
}

impl Decision {
    /// Create an unresolved decision and the sender that resolves it.
    pub fn pending(hash: CommandHash) -> (oneshot::Sender<CommittedCommand>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { hash, rx })
    }

    /// Create a decision that is already resolved.
    pub fn resolved(committed: CommittedCommand) -> Self {
        let (tx, decision) = Self::pending(committed.hash);
        // The receiver is alive in `decision`, so the send cannot fail.
        let _ = tx.send(committed);
        decision
    }

    /// Hash of the command this decision is for.
    pub fn hash(&self) -> &CommandHash {
        &self.hash
    }
}

impl Future for Decision {
    type Output = Result<CommittedCommand, DecisionAbandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let hash = self.hash;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map_err(|_| DecisionAbandoned(hash))
    }
}

/// Result of cutting a block from the local queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    /// Height of the committed block.
    pub height: i64,
    /// Id of the committed block.
    pub block_id: BlockId,
    /// Commands decided by this block.
    pub decided: usize,
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {} at height {} ({} commands)",
            short_hex(&self.block_id),
            self.height,
            self.decided
        )
    }
}
