//! Mutable state of the decision core.
//!
//! Plain data with no locking; [`DecisionCore`](crate::DecisionCore) wraps it
//! in a `parking_lot::RwLock`.

use crate::domain::{CoreError, CoreResult, Decision};
use shared_types::{
    BlockId, Command, CommandHash, CommittedCommand, Finality, PeerDescriptor, ReplicaId,
    ZERO_HASH,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Last committed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub height: i64,
    pub block_id: BlockId,
}

impl Default for ChainTip {
    fn default() -> Self {
        // Genesis: height 0 never carries commands.
        Self {
            height: 0,
            block_id: ZERO_HASH,
        }
    }
}

/// Decision senders paired with the value they must receive.
pub type Resolutions = Vec<(Vec<oneshot::Sender<CommittedCommand>>, CommittedCommand)>;

/// Command queue, decision registry and decided history.
#[derive(Debug, Default)]
pub struct CoreState {
    /// Commands registered but not decided, by hash.
    queued: HashMap<CommandHash, Arc<Command>>,
    /// Registration order of `queued`. May hold hashes decided meanwhile,
    /// never more than twice as many as `queued` after a commit.
    queue_order: VecDeque<CommandHash>,
    /// Open decisions per hash.
    waiters: HashMap<CommandHash, Vec<oneshot::Sender<CommittedCommand>>>,
    /// Decided commands still retained.
    decided: HashMap<CommandHash, CommittedCommand>,
    /// Decision order of `decided`, oldest first.
    decision_order: VecDeque<CommandHash>,
    /// Registered peers.
    peers: BTreeMap<ReplicaId, PeerDescriptor>,
    /// Last committed block.
    tip: ChainTip,
}

impl CoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command. Returns false if the hash is already queued or decided.
    pub fn enqueue(&mut self, hash: CommandHash, command: Arc<Command>) -> bool {
        if self.queued.contains_key(&hash) || self.decided.contains_key(&hash) {
            return false;
        }
        self.queued.insert(hash, command);
        self.queue_order.push_back(hash);
        true
    }

    /// Open a decision for `hash`.
    pub fn register_waiter(&mut self, hash: CommandHash) -> Decision {
        if let Some(committed) = self.decided.get(&hash) {
            return Decision::resolved(committed.clone());
        }
        let (tx, decision) = Decision::pending(hash);
        self.waiters.entry(hash).or_default().push(tx);
        decision
    }

    /// Pop up to `max` queued commands in registration order.
    pub fn take_batch(&mut self, max: usize) -> Vec<(CommandHash, Arc<Command>)> {
        let mut batch = Vec::with_capacity(max.min(self.queued.len()));
        while batch.len() < max {
            let Some(hash) = self.queue_order.pop_front() else {
                break;
            };
            if let Some(command) = self.queued.remove(&hash) {
                batch.push((hash, command));
            }
        }
        batch
    }

    /// Record a committed block and collect the decisions it resolves.
    ///
    /// Commands already decided by an earlier block keep their first
    /// finality and are skipped.
    pub fn commit(
        &mut self,
        height: i64,
        block_id: BlockId,
        commands: Vec<(CommandHash, Arc<Command>)>,
    ) -> CoreResult<Resolutions> {
        if height <= self.tip.height {
            return Err(CoreError::StaleCommit {
                height,
                tip: self.tip.height,
            });
        }
        self.tip = ChainTip { height, block_id };

        let finality = Finality::committed(height, block_id);
        let mut resolutions = Vec::with_capacity(commands.len());
        for (hash, command) in commands {
            self.queued.remove(&hash);
            if self.decided.contains_key(&hash) {
                continue;
            }
            let committed = CommittedCommand {
                hash,
                command,
                finality,
            };
            self.decided.insert(hash, committed.clone());
            self.decision_order.push_back(hash);
            let senders = self.waiters.remove(&hash).unwrap_or_default();
            resolutions.push((senders, committed));
        }
        self.compact_queue_order();
        Ok(resolutions)
    }

    /// Drop hashes decided by commits that bypassed `take_batch`.
    fn compact_queue_order(&mut self) {
        if self.queue_order.len() > 2 * self.queued.len() {
            let queued = &self.queued;
            self.queue_order.retain(|hash| queued.contains_key(hash));
        }
    }

    pub fn find(&self, hash: &CommandHash) -> Option<CommittedCommand> {
        self.decided.get(hash).cloned()
    }

    /// Evict oldest decisions until at most `max_retained` remain.
    pub fn prune(&mut self, max_retained: usize) -> usize {
        let mut evicted = 0;
        while self.decision_order.len() > max_retained {
            let Some(hash) = self.decision_order.pop_front() else {
                break;
            };
            self.decided.remove(&hash);
            evicted += 1;
        }
        evicted
    }

    pub fn add_peer(&mut self, peer: PeerDescriptor) -> CoreResult<()> {
        if self.peers.contains_key(&peer.id) {
            return Err(CoreError::DuplicateReplica(peer.id));
        }
        self.peers.insert(peer.id, peer);
        Ok(())
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    pub fn decided_count(&self) -> usize {
        self.decided.len()
    }

    /// Number of open decision futures.
    pub fn waiting_count(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }

    pub fn tip(&self) -> ChainTip {
        self.tip
    }
}
