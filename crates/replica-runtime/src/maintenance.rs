//! Periodic maintenance: statistics output and pruning of decided commands.

use replica_core::ReplicaCore;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Recurring timer driving `print_stat` and `prune` on the core.
///
/// The first firing happens one period after creation. Firings missed while
/// the loop was busy are skipped, never replayed in a burst.
pub struct MaintenanceTimer {
    interval: Interval,
    prune_budget: usize,
    firings: u64,
}

impl MaintenanceTimer {
    pub fn new(period: Duration, prune_budget: usize) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            prune_budget,
            firings: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next firing. Cancel safe.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Run one maintenance pass. Returns the number of commands pruned.
    pub fn fire(&mut self, core: &dyn ReplicaCore) -> usize {
        core.print_stat();
        let evicted = core.prune(self.prune_budget);
        self.firings += 1;
        debug!(
            firing = self.firings,
            evicted = evicted,
            budget = self.prune_budget,
            "Maintenance pass complete"
        );
        evicted
    }

    /// Passes run so far.
    pub fn firings(&self) -> u64 {
        self.firings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{SigningKey, VerifyingKey};
    use replica_core::{CoreResult, Decision};
    use shared_types::{
        BincodeCommandCodec, Command, CommandCodec, CommandHash, CommittedCommand, ReplicaId,
    };
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Core that only records maintenance calls.
    #[derive(Default)]
    struct RecordingCore {
        stats_printed: AtomicUsize,
        prune_budgets: parking_lot::Mutex<Vec<usize>>,
    }

    impl ReplicaCore for RecordingCore {
        fn codec(&self) -> Arc<dyn CommandCodec> {
            Arc::new(BincodeCommandCodec)
        }
        fn add_command(&self, _hash: CommandHash, _command: Command) {}
        fn async_decide(&self, hash: CommandHash) -> Decision {
            Decision::pending(hash).1
        }
        fn find_cmd(&self, _hash: &CommandHash) -> Option<CommittedCommand> {
            None
        }
        fn add_replica(&self, _: ReplicaId, _: SocketAddr, _: VerifyingKey) -> CoreResult<()> {
            Ok(())
        }
        fn size(&self) -> usize {
            0
        }
        fn start(&self) -> CoreResult<()> {
            Ok(())
        }
        fn print_stat(&self) {
            self.stats_printed.fetch_add(1, Ordering::Relaxed);
        }
        fn prune(&self, max_retained: usize) -> usize {
            self.prune_budgets.lock().push(max_retained);
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_period() {
        let core = RecordingCore::default();
        let period = Duration::from_secs(10);
        let mut timer = MaintenanceTimer::new(period, 100);

        for _ in 0..3 {
            tokio::time::timeout(period * 2, timer.tick())
                .await
                .expect("timer did not fire within two periods");
            timer.fire(&core);
        }

        assert_eq!(timer.firings(), 3);
        assert_eq!(core.stats_printed.load(Ordering::Relaxed), 3);
        assert_eq!(*core.prune_budgets.lock(), vec![100, 100, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_firing_waits_one_period() {
        let mut timer = MaintenanceTimer::new(Duration::from_secs(5), 100);
        let started = Instant::now();
        timer.tick().await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_firings_are_skipped() {
        let period = Duration::from_secs(1);
        let mut timer = MaintenanceTimer::new(period, 100);

        tokio::time::advance(Duration::from_millis(5_500)).await;

        // One catch-up firing, not five
        tokio::time::timeout(Duration::ZERO, timer.tick())
            .await
            .expect("overdue firing should be ready");
        assert!(tokio::time::timeout(Duration::ZERO, timer.tick())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prunes_real_core_to_budget() {
        use replica_core::{CoreConfig, DecisionCore};

        let mut config = CoreConfig::new(0, SigningKey::random(&mut rand::thread_rng()));
        config.commit_interval = None;
        let core = DecisionCore::new(config, Arc::new(BincodeCommandCodec));

        let commands: Vec<Command> = (0..5u8).map(|i| Command::new(vec![i])).collect();
        let first_hash = BincodeCommandCodec.hash(&commands[0]).unwrap();
        let last_hash = BincodeCommandCodec.hash(&commands[4]).unwrap();
        for (height, command) in commands.into_iter().enumerate() {
            core.deliver_commit(height as i64 + 1, [height as u8; 32], vec![command])
                .unwrap();
        }

        let mut timer = MaintenanceTimer::new(Duration::from_secs(1), 2);
        timer.tick().await;
        assert_eq!(timer.fire(&core), 3);

        assert_eq!(core.decided_count(), 2);
        assert!(core.find_cmd(&first_hash).is_none());
        assert!(core.find_cmd(&last_hash).is_some());
    }
}
