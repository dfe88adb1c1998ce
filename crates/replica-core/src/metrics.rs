//! # Core Metrics
//!
//! In-process counters for the periodic statistics line, plus optional
//! Prometheus counters.
//!
//! ## Usage
//!
//! Enable Prometheus export with the `metrics` feature:
//! ```toml
//! replica-core = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `replica_commands_added_total` - Commands accepted into the queue
//! - `replica_commands_decided_total` - Commands decided by a commit
//! - `replica_blocks_committed_total` - Blocks committed
//! - `replica_commands_pruned_total` - Decided commands evicted by pruning

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, IntCounter};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref COMMANDS_ADDED: IntCounter = register_int_counter!(
        "replica_commands_added_total",
        "Commands accepted into the queue"
    )
    .expect("Failed to create COMMANDS_ADDED metric");

    pub static ref COMMANDS_DECIDED: IntCounter = register_int_counter!(
        "replica_commands_decided_total",
        "Commands decided by a commit"
    )
    .expect("Failed to create COMMANDS_DECIDED metric");

    pub static ref BLOCKS_COMMITTED: IntCounter = register_int_counter!(
        "replica_blocks_committed_total",
        "Blocks committed"
    )
    .expect("Failed to create BLOCKS_COMMITTED metric");

    pub static ref COMMANDS_PRUNED: IntCounter = register_int_counter!(
        "replica_commands_pruned_total",
        "Decided commands evicted by pruning"
    )
    .expect("Failed to create COMMANDS_PRUNED metric");
}

/// Cumulative core counters.
#[derive(Debug, Default)]
pub struct CoreStats {
    /// Commands accepted into the queue.
    pub commands_added: AtomicU64,
    /// Submissions ignored because the hash was already known.
    pub duplicates_ignored: AtomicU64,
    /// Commands decided.
    pub commands_decided: AtomicU64,
    /// Blocks committed.
    pub blocks_committed: AtomicU64,
    /// Decided commands evicted.
    pub commands_pruned: AtomicU64,
}

/// Point-in-time copy of [`CoreStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStatsSnapshot {
    pub commands_added: u64,
    pub duplicates_ignored: u64,
    pub commands_decided: u64,
    pub blocks_committed: u64,
    pub commands_pruned: u64,
}

impl CoreStats {
    pub fn record_added(&self) {
        self.commands_added.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        COMMANDS_ADDED.inc();
    }

    pub fn record_duplicate(&self) {
        self.duplicates_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self, decided: usize) {
        self.blocks_committed.fetch_add(1, Ordering::Relaxed);
        self.commands_decided
            .fetch_add(decided as u64, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        {
            BLOCKS_COMMITTED.inc();
            COMMANDS_DECIDED.inc_by(decided as u64);
        }
    }

    pub fn record_pruned(&self, evicted: usize) {
        self.commands_pruned
            .fetch_add(evicted as u64, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        COMMANDS_PRUNED.inc_by(evicted as u64);
    }

    pub fn snapshot(&self) -> CoreStatsSnapshot {
        CoreStatsSnapshot {
            commands_added: self.commands_added.load(Ordering::Relaxed),
            duplicates_ignored: self.duplicates_ignored.load(Ordering::Relaxed),
            commands_decided: self.commands_decided.load(Ordering::Relaxed),
            blocks_committed: self.blocks_committed.load(Ordering::Relaxed),
            commands_pruned: self.commands_pruned.load(Ordering::Relaxed),
        }
    }
}
