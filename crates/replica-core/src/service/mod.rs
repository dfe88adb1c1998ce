//! Decision Core - in-memory implementation of [`ReplicaCore`].
//!
//! # Architecture
//! - Commands are queued by hash, in registration order
//! - Commits arrive through `deliver_commit` (consensus) or `commit_pending`
//!   (stand-alone driver) and resolve every open decision for their commands
//! - Decided commands are retained oldest-first until pruned

use crate::domain::{CommitSummary, CoreConfig, CoreError, CoreResult, Decision};
use crate::metrics::{CoreStats, CoreStatsSnapshot};
use crate::ports::ReplicaCore;
use crate::state::{ChainTip, CoreState, Resolutions};
use k256::ecdsa::VerifyingKey;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use shared_types::{
    short_hex, BlockId, Command, CommandCodec, CommandHash, CommittedCommand, PeerDescriptor,
    ReplicaId,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Decision Core
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct DecisionCore {
    inner: Arc<CoreInner>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

struct CoreInner {
    config: CoreConfig,
    codec: Arc<dyn CommandCodec>,
    state: RwLock<CoreState>,
    stats: CoreStats,
    last_stat: Mutex<CoreStatsSnapshot>,
    started: AtomicBool,
}

impl DecisionCore {
    pub fn new(config: CoreConfig, codec: Arc<dyn CommandCodec>) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                config,
                codec,
                state: RwLock::new(CoreState::new()),
                stats: CoreStats::default(),
                last_stat: Mutex::new(CoreStatsSnapshot::default()),
                started: AtomicBool::new(false),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Last committed block.
    pub fn tip(&self) -> ChainTip {
        self.inner.state.read().tip()
    }

    pub fn stats(&self) -> CoreStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of commands registered and not yet decided.
    pub fn queued_count(&self) -> usize {
        self.inner.state.read().queued_count()
    }

    /// Number of decided commands currently retained.
    pub fn decided_count(&self) -> usize {
        self.inner.state.read().decided_count()
    }

    /// Commit notification from the consensus protocol.
    ///
    /// `commands` are the contents of block `block_id` at `height`, in block
    /// order. Returns the number of commands newly decided.
    pub fn deliver_commit(
        &self,
        height: i64,
        block_id: BlockId,
        commands: Vec<Command>,
    ) -> CoreResult<usize> {
        let hashed = commands
            .into_iter()
            .map(|command| {
                let hash = self.inner.codec.hash(&command)?;
                Ok((hash, Arc::new(command)))
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let resolutions = self.inner.state.write().commit(height, block_id, hashed)?;
        let decided = resolutions.len();
        self.inner.stats.record_block(decided);
        debug!(
            height = height,
            block = %short_hex(&block_id),
            decided = decided,
            "Commit delivered"
        );
        resolve(resolutions);
        Ok(decided)
    }

    /// Cut the next block from the local queue and commit it.
    ///
    /// Returns `None` when nothing is queued.
    pub fn commit_pending(&self) -> CoreResult<Option<CommitSummary>> {
        self.inner.commit_pending()
    }
}

impl CoreInner {
    fn commit_pending(&self) -> CoreResult<Option<CommitSummary>> {
        let (summary, resolutions) = {
            let mut state = self.state.write();
            let batch = state.take_batch(self.config.block_size);
            if batch.is_empty() {
                return Ok(None);
            }
            let tip = state.tip();
            let height = tip.height + 1;
            let block_id = derive_block_id(&tip.block_id, height, batch.iter().map(|(h, _)| h));
            let resolutions = state.commit(height, block_id, batch)?;
            let summary = CommitSummary {
                height,
                block_id,
                decided: resolutions.len(),
            };
            (summary, resolutions)
        };

        self.stats.record_block(summary.decided);
        resolve(resolutions);
        Ok(Some(summary))
    }
}

impl Drop for DecisionCore {
    fn drop(&mut self) {
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
    }
}

impl ReplicaCore for DecisionCore {
    fn codec(&self) -> Arc<dyn CommandCodec> {
        Arc::clone(&self.inner.codec)
    }

    fn add_command(&self, hash: CommandHash, command: Command) {
        if self.inner.state.write().enqueue(hash, Arc::new(command)) {
            self.inner.stats.record_added();
        } else {
            self.inner.stats.record_duplicate();
            debug!(hash = %short_hex(&hash), "Command already known, not queued again");
        }
    }

    fn async_decide(&self, hash: CommandHash) -> Decision {
        self.inner.state.write().register_waiter(hash)
    }

    fn find_cmd(&self, hash: &CommandHash) -> Option<CommittedCommand> {
        self.inner.state.read().find(hash)
    }

    fn add_replica(
        &self,
        id: ReplicaId,
        addr: SocketAddr,
        public_key: VerifyingKey,
    ) -> CoreResult<()> {
        if self.inner.started.load(Ordering::Acquire) {
            return Err(CoreError::AlreadyStarted);
        }
        if id == self.inner.config.replica_id && public_key != self.inner.config.public_key() {
            return Err(CoreError::KeyMismatch(id));
        }
        self.inner.state.write().add_peer(PeerDescriptor {
            id,
            addr,
            public_key,
        })?;
        debug!(replica = id, addr = %addr, "Registered replica");
        Ok(())
    }

    fn size(&self) -> usize {
        self.inner.state.read().peer_count()
    }

    fn start(&self) -> CoreResult<()> {
        let driver_period = self
            .inner
            .config
            .commit_interval
            .filter(|period| !period.is_zero());
        let runtime = match driver_period {
            Some(_) => Some(tokio::runtime::Handle::try_current().map_err(|_| CoreError::NoRuntime)?),
            None => None,
        };

        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(CoreError::AlreadyStarted);
        }

        info!(
            replica = self.inner.config.replica_id,
            peers = self.size(),
            "Replica core started"
        );

        if let (Some(period), Some(runtime)) = (driver_period, runtime) {
            info!(period_ms = period.as_millis() as u64, "Stand-alone commit driver enabled");
            let inner = Arc::clone(&self.inner);
            *self.driver.lock() = Some(runtime.spawn(run_commit_driver(inner, period)));
        }
        Ok(())
    }

    fn print_stat(&self) {
        let (tip, queued, waiting, retained) = {
            let state = self.inner.state.read();
            (
                state.tip(),
                state.queued_count(),
                state.waiting_count(),
                state.decided_count(),
            )
        };
        let now = self.inner.stats.snapshot();
        let decided_since = {
            let mut last = self.inner.last_stat.lock();
            let delta = now.commands_decided - last.commands_decided;
            *last = now;
            delta
        };

        info!(
            replica = self.inner.config.replica_id,
            height = tip.height,
            queued = queued,
            waiting = waiting,
            retained = retained,
            decided_since_last = decided_since,
            decided_total = now.commands_decided,
            blocks = now.blocks_committed,
            pruned = now.commands_pruned,
            "Replica statistics"
        );
    }

    fn prune(&self, max_retained: usize) -> usize {
        let evicted = self.inner.state.write().prune(max_retained);
        if evicted > 0 {
            self.inner.stats.record_pruned(evicted);
            debug!(evicted = evicted, max_retained = max_retained, "Pruned decided commands");
        }
        evicted
    }
}

/// Hand each decided command to every open decision for it.
fn resolve(resolutions: Resolutions) {
    for (senders, committed) in resolutions {
        for tx in senders {
            // A dropped receiver only means nobody waits for the answer anymore.
            let _ = tx.send(committed.clone());
        }
    }
}

/// Block id for locally cut blocks: SHA-256 over parent, height and contents.
fn derive_block_id<'a>(
    parent: &BlockId,
    height: i64,
    hashes: impl Iterator<Item = &'a CommandHash>,
) -> BlockId {
    let mut hasher = Sha256::new();
    hasher.update(parent);
    hasher.update(height.to_be_bytes());
    for hash in hashes {
        hasher.update(hash);
    }
    hasher.finalize().into()
}

async fn run_commit_driver(inner: Arc<CoreInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match inner.commit_pending() {
            Ok(Some(summary)) => debug!(%summary, "Committed block"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Commit driver failed to cut a block"),
        }
    }
}
