//! # Client Flows
//!
//! Submit and check commands against a running replica over TCP.
//!
//! ## Flows Tested
//!
//! 1. **Valid submission**: one response carrying the committed finality
//! 2. **Forged submission**: immediate rejection, the core never sees it
//! 3. **Check**: unknown and pending look alike, decided matches submit
//! 4. **Duplicates**: two clients, one command, same finality for both
//! 5. **Malformed frames**: the connection is closed, the replica lives on

#[cfg(test)]
mod tests {
    use super::super::fixtures::{forged_command, signed_command, ReplicaOptions, TestReplica};
    use client_gateway::wire::{opcodes, read_frame, write_frame};
    use client_gateway::ClientError;
    use replica_core::ReplicaCore;
    use shared_types::{Command, Finality, ZERO_HASH};
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn manual_commits() -> ReplicaOptions {
        ReplicaOptions {
            commit_interval: Duration::ZERO,
            ..ReplicaOptions::default()
        }
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    #[tokio::test]
    async fn test_valid_command_is_committed() {
        let replica = TestReplica::start(ReplicaOptions::default()).await;
        let mut client = replica.client().await;

        let hash = client.submit(&signed_command(b"transfer 10")).await.unwrap();
        let finality = timeout(WAIT, client.wait_for(hash)).await.unwrap().unwrap();

        assert!(finality.is_committed());
        assert_ne!(finality.block_id, ZERO_HASH);
        assert_eq!(replica.core.find_cmd(&hash).unwrap().finality, finality);

        let summary = replica.stop().await;
        assert_eq!(summary.gateway.submitted, 1);
        assert_eq!(summary.gateway.responses_sent, 1);
    }

    #[tokio::test]
    async fn test_forged_command_is_rejected() {
        let replica = TestReplica::start(ReplicaOptions::default()).await;
        let mut client = replica.client().await;

        let hash = client.submit(&forged_command(b"c1")).await.unwrap();
        let response = timeout(WAIT, client.next_response()).await.unwrap().unwrap();

        assert_eq!(response.hash, hash);
        assert_eq!(response.finality, Finality::rejected());
        assert_eq!(response.finality.block_id, ZERO_HASH);
        assert!(replica.core.find_cmd(&hash).is_none());
        assert_eq!(replica.core.stats().commands_added, 0);

        // Nothing was queued, so nothing will ever commit it
        let later = client.query(hash).await.unwrap();
        assert_eq!(later, Finality::default());

        replica.stop().await;
    }

    #[tokio::test]
    async fn test_commit_from_consensus_reaches_client() {
        let replica = TestReplica::start(manual_commits()).await;
        let mut client = replica.client().await;

        let command = signed_command(b"c2");
        let hash = client.submit(&command).await.unwrap();

        // Pending: a check answers the default finality
        assert_eq!(client.query(hash).await.unwrap(), Finality::default());
        while replica.core.queued_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        replica
            .core
            .deliver_commit(7, [0xB7; 32], vec![command])
            .unwrap();

        let finality = timeout(WAIT, client.wait_for(hash)).await.unwrap().unwrap();
        assert_eq!(finality, Finality::committed(7, [0xB7; 32]));
        assert_eq!(client.query(hash).await.unwrap(), finality);

        replica.stop().await;
    }

    #[tokio::test]
    async fn test_interleaved_submissions_on_one_connection() {
        let replica = TestReplica::start(ReplicaOptions {
            block_size: 3,
            ..ReplicaOptions::default()
        })
        .await;
        let mut client = replica.client().await;

        let mut hashes = Vec::new();
        for i in 0..6u8 {
            hashes.push(client.submit(&Command::new(vec![i; 8])).await.unwrap());
        }

        // Ask in reverse; responses for other hashes are kept
        for hash in hashes.iter().rev() {
            let finality = timeout(WAIT, client.wait_for(*hash)).await.unwrap().unwrap();
            assert!(finality.is_committed());
        }

        replica.stop().await;
    }

    // =========================================================================
    // CHECK
    // =========================================================================

    #[tokio::test]
    async fn test_check_unknown_hash() {
        let replica = TestReplica::start(ReplicaOptions::default()).await;
        let mut client = replica.client().await;

        let finality = timeout(WAIT, client.query([0x42; 32])).await.unwrap().unwrap();
        assert_eq!(finality, Finality::default());

        let summary = replica.stop().await;
        assert_eq!(summary.gateway.checks, 1);
    }

    // =========================================================================
    // DUPLICATES
    // =========================================================================

    #[tokio::test]
    async fn test_duplicate_submission_answers_both_clients() {
        let replica = TestReplica::start(manual_commits()).await;
        let mut first = replica.client().await;
        let mut second = replica.client().await;

        let command = signed_command(b"once");
        let hash = first.submit(&command).await.unwrap();
        assert_eq!(second.submit(&command).await.unwrap(), hash);

        // Both submissions must be registered before the commit
        while replica.core.stats().duplicates_ignored == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        replica.core.deliver_commit(1, [1; 32], vec![command]).unwrap();

        let a = timeout(WAIT, first.wait_for(hash)).await.unwrap().unwrap();
        let b = timeout(WAIT, second.wait_for(hash)).await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Finality::committed(1, [1; 32]));

        replica.stop().await;
    }

    // =========================================================================
    // MALFORMED INPUT
    // =========================================================================

    #[tokio::test]
    async fn test_unknown_opcode_closes_connection() {
        let replica = TestReplica::start(ReplicaOptions::default()).await;

        let mut raw = TcpStream::connect(replica.client_addr).await.unwrap();
        write_frame(&mut raw, &[0x42, 1, 2, 3]).await.unwrap();
        let closed = timeout(WAIT, read_frame(&mut raw, 1024)).await.unwrap();
        assert!(matches!(closed, Ok(None) | Err(_)));

        // Other clients are unaffected
        let mut client = replica.client().await;
        let hash = client.submit(&signed_command(b"after")).await.unwrap();
        assert!(timeout(WAIT, client.wait_for(hash))
            .await
            .unwrap()
            .unwrap()
            .is_committed());

        let summary = replica.stop().await;
        assert_eq!(summary.gateway.malformed, 1);
    }

    #[tokio::test]
    async fn test_undecodable_command_gets_no_response() {
        let replica = TestReplica::start(ReplicaOptions::default()).await;
        let mut client = replica.client().await;

        client.submit_raw(vec![0xde, 0xad]).await.unwrap();
        assert!(timeout(Duration::from_millis(200), client.next_response())
            .await
            .is_err());

        // The connection stays usable
        assert_eq!(client.query([1; 32]).await.unwrap(), Finality::default());

        replica.stop().await;
    }

    #[tokio::test]
    async fn test_client_sees_closed_connection_on_shutdown() {
        let replica = TestReplica::start(manual_commits()).await;
        let mut client = replica.client().await;
        let hash = client.submit(&signed_command(b"never")).await.unwrap();

        let summary = replica.stop().await;
        assert_eq!(summary.gateway.responses_sent, 0);

        let result = timeout(WAIT, client.wait_for(hash)).await.unwrap();
        assert!(matches!(
            result,
            Err(ClientError::ConnectionClosed) | Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn test_opcode_values() {
        assert_eq!(opcodes::REQ_CMD, 0x04);
        assert_eq!(opcodes::RESP_CMD, 0x05);
        assert_eq!(opcodes::CHK_CMD, 0x06);
    }
}
