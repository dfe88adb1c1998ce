//! Pending Decision Store - bridge between core decisions and client replies.
//!
//! Maps each accepted submission to the address that must receive its
//! finality. The store is owned by the gateway loop and polled from it, so
//! every reply is produced on the loop thread no matter which task resolved
//! the decision.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use replica_core::{Decision, DecisionAbandoned};
use shared_types::{short_hex, CommandHash, CommittedCommand};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A decision that finished, with the address waiting for it.
#[derive(Debug)]
pub struct ResolvedDecision {
    /// Connection that submitted the command
    pub addr: SocketAddr,
    /// Hash the decision was opened for
    pub hash: CommandHash,
    /// Decided command, or the core gave up on it
    pub outcome: Result<CommittedCommand, DecisionAbandoned>,
    /// Time between registration and resolution
    pub waited: Duration,
}

/// Statistics for the pending decision store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total decisions registered
    pub total_registered: AtomicU64,
    /// Total decisions resolved with a finality
    pub total_resolved: AtomicU64,
    /// Total decisions dropped by the core without a finality
    pub total_abandoned: AtomicU64,
}

/// Pending decision store.
///
/// Flow:
/// 1. Submit handler obtains a `Decision` from the core
/// 2. Handler calls `register()` with the reply address
/// 3. Gateway loop awaits `next_resolved()` alongside its other events
/// 4. Loop turns the resolution into a RESP_CMD for the stored address
///
/// There is no timeout and no cancellation: an entry leaves the store only
/// when its decision resolves or is abandoned.
pub struct PendingDecisionStore {
    in_flight: FuturesUnordered<BoxFuture<'static, ResolvedDecision>>,
    stats: Arc<PendingStats>,
}

impl PendingDecisionStore {
    pub fn new() -> Self {
        Self {
            in_flight: FuturesUnordered::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Wait for `decision` on behalf of `addr`.
    pub fn register(&mut self, addr: SocketAddr, decision: Decision) {
        let hash = *decision.hash();
        let created_at = Instant::now();

        self.in_flight.push(
            async move {
                let outcome = decision.await;
                ResolvedDecision {
                    addr,
                    hash,
                    outcome,
                    waited: created_at.elapsed(),
                }
            }
            .boxed(),
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            hash = %short_hex(&hash),
            addr = %addr,
            "Registered pending decision"
        );
    }

    /// Next decision to resolve, in resolution order.
    ///
    /// Returns `None` immediately when nothing is pending. Cancel safe.
    pub async fn next_resolved(&mut self) -> Option<ResolvedDecision> {
        let resolved = self.in_flight.next().await?;
        match &resolved.outcome {
            Ok(_) => {
                self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            }
        }
        Some(resolved)
    }

    /// Number of decisions still waiting
    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<PendingStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for PendingDecisionStore {
    fn default() -> Self {
        Self::new()
    }
}
