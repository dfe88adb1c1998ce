//! # Replica Flows
//!
//! Startup, maintenance and shutdown of a whole replica.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{random_key, signed_command, ReplicaOptions, TestReplica};
    use replica_core::ReplicaCore;
    use shared_types::Finality;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_all_replicas_registered_before_start() {
        let replica = TestReplica::start(ReplicaOptions {
            group_size: 7,
            ..ReplicaOptions::default()
        })
        .await;

        assert_eq!(replica.core.size(), 7);
        assert!(replica
            .core
            .add_replica(
                7,
                "127.0.0.1:10007".parse().unwrap(),
                *random_key().verifying_key(),
            )
            .is_err());

        replica.stop().await;
    }

    #[tokio::test]
    async fn test_maintenance_prunes_oldest_decisions() {
        let replica = TestReplica::start(ReplicaOptions {
            stat_period: Duration::from_millis(100),
            prune_budget: 1,
            ..ReplicaOptions::default()
        })
        .await;
        let mut client = replica.client().await;

        let mut hashes = Vec::new();
        for i in 0..3u8 {
            let hash = client.submit(&signed_command(&[i])).await.unwrap();
            let finality = timeout(WAIT, client.wait_for(hash)).await.unwrap().unwrap();
            assert!(finality.is_committed());
            hashes.push((hash, finality));
        }

        tokio::time::sleep(Duration::from_millis(350)).await;

        let (oldest, _) = hashes[0];
        let (newest, newest_finality) = hashes[2];
        assert_eq!(client.query(oldest).await.unwrap(), Finality::default());
        assert_eq!(client.query(newest).await.unwrap(), newest_finality);
        assert!(replica.core.decided_count() <= 1);

        let summary = replica.stop().await;
        assert!(summary.maintenance_passes >= 2);
        assert_eq!(summary.core.commands_pruned, 2);
    }

    #[tokio::test]
    async fn test_stop_without_draining_pending_decisions() {
        let replica = TestReplica::start(ReplicaOptions {
            commit_interval: Duration::ZERO,
            ..ReplicaOptions::default()
        })
        .await;
        let mut client = replica.client().await;
        client.submit(&signed_command(b"left behind")).await.unwrap();

        while replica.core.queued_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let summary = timeout(WAIT, replica.stop()).await.unwrap();
        assert_eq!(summary.gateway.submitted, 1);
        assert_eq!(summary.core.commands_decided, 0);
    }
}
