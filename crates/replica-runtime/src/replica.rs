//! # Replica Orchestrator
//!
//! Owns the replica core, the client gateway and the maintenance timer, and
//! drives all three from one event loop.
//!
//! ## Startup Sequence
//!
//! 1. Build the core (replica id, signing key, block size, parent limit)
//! 2. Bind the client gateway
//! 3. Register every replica of the group with the core
//! 4. Start the core
//! 5. Arm the maintenance timer
//! 6. Log the start parameters
//!
//! ## Event Loop
//!
//! ```text
//!            ┌──────────── select! ─────────────┐
//! shutdown ──┤  exit                            │
//! timer    ──┤  print_stat + prune              │
//! gateway  ──┤  client event / resolved decision│
//!            └──────────────────────────────────┘
//! ```
//!
//! Shutdown does not drain pending decisions.

use crate::config::ReplicaSetup;
use client_gateway::{verification_enabled, ClientGateway, GatewayError, GatewaySnapshot};
use replica_core::metrics::CoreStatsSnapshot;
use replica_core::{CoreConfig, CoreError, DecisionCore, ReplicaCore};
use shared_types::{BincodeCommandCodec, ReplicaId};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::maintenance::MaintenanceTimer;

/// Errors that stop a replica from starting.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("replica core: {0}")]
    Core(#[from] CoreError),
}

/// A running replica.
pub struct Replica {
    replica_id: ReplicaId,
    core: Arc<DecisionCore>,
    gateway: ClientGateway,
    timer: MaintenanceTimer,
    started_at: Instant,
}

impl Replica {
    /// Bring up all subsystems. Must be called inside a tokio runtime.
    pub async fn start(setup: ReplicaSetup) -> Result<Self, RuntimeError> {
        let started_at = Instant::now();

        // Step 1: core
        let mut core_config = CoreConfig::new(setup.replica_id, setup.signing_key.clone());
        core_config.block_size = setup.block_size;
        core_config.parent_limit = setup.parent_limit;
        core_config.commit_interval = setup.commit_interval;
        let core = Arc::new(DecisionCore::new(core_config, Arc::new(BincodeCommandCodec)));

        // Step 2: client gateway
        let gateway = ClientGateway::bind(setup.gateway.clone(), core.clone()).await?;

        // Step 3: replica group
        for peer in &setup.peers {
            core.add_replica(peer.id, peer.addr, peer.public_key)?;
        }

        // Step 4: core activity
        core.start()?;

        // Step 5: maintenance
        let timer = MaintenanceTimer::new(setup.stat_period, setup.prune_budget);

        info!("===========================================");
        info!("  BFT Replica {}", setup.replica_id);
        info!("===========================================");
        info!(
            blk_size = setup.block_size,
            parent_limit = setup.parent_limit,
            stat_period = ?setup.stat_period,
            prune_budget = setup.prune_budget,
            conns = core.size(),
            "Replica parameters"
        );
        info!(
            peer_addr = %setup.peer_listen_addr,
            client_addr = %gateway.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            "Listening"
        );
        if verification_enabled() {
            info!("** command verification enabled **");
        } else {
            warn!("** command verification disabled **");
        }

        Ok(Self {
            replica_id: setup.replica_id,
            core,
            gateway,
            timer,
            started_at,
        })
    }

    /// Address clients connect to.
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.gateway.local_addr()
    }

    pub fn core(&self) -> Arc<DecisionCore> {
        Arc::clone(&self.core)
    }

    /// Run the event loop until `shutdown` turns `true` or its sender is
    /// dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        info!(replica = self.replica_id, "Replica event loop running");

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                // Ahead of the gateway: a busy client queue must not starve
                // maintenance.
                _ = self.timer.tick() => {
                    self.timer.fire(self.core.as_ref());
                }
                alive = self.gateway.turn() => {
                    if !alive {
                        warn!("Client gateway closed");
                        break;
                    }
                }
            }
        }

        let summary = self.summary();
        info!(
            pending = self.gateway.pending_count(),
            abandoned = summary.gateway.decisions_abandoned,
            gateway = %summary.gateway,
            decided = summary.core.commands_decided,
            blocks = summary.core.blocks_committed,
            pruned = summary.core.commands_pruned,
            maintenance_passes = summary.maintenance_passes,
            "Replica stopped"
        );
        summary
    }

    /// Counters since start.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            elapsed: self.started_at.elapsed(),
            gateway: self.gateway.snapshot(),
            core: self.core.stats(),
            maintenance_passes: self.timer.firings(),
        }
    }
}

/// What a replica did during its run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub gateway: GatewaySnapshot,
    pub core: CoreStatsSnapshot,
    pub maintenance_passes: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elapsed {:.3}s, {} decided in {} blocks, {}",
            self.elapsed.as_secs_f64(),
            self.core.commands_decided,
            self.core.blocks_committed,
            self.gateway
        )
    }
}
