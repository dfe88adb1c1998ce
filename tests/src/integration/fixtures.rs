//! Test harness: a replica running in the background and key helpers.

use client_gateway::GatewayClient;
use k256::ecdsa::SigningKey;
use replica_core::DecisionCore;
use replica_runtime::{Replica, ReplicaConfig, RunSummary};
use shared_types::{sign_command, Command};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Generate a fresh secp256k1 key.
pub fn random_key() -> SigningKey {
    SigningKey::random(&mut rand::thread_rng())
}

/// A command signed by a fresh key.
pub fn signed_command(payload: &[u8]) -> Command {
    let mut command = Command::new(payload.to_vec());
    sign_command(&mut command, &random_key());
    command
}

/// A signed command whose payload was altered after signing.
pub fn forged_command(payload: &[u8]) -> Command {
    let mut command = signed_command(payload);
    command.payload.push(0xff);
    command
}

/// Knobs for [`TestReplica::start`].
#[derive(Debug, Clone)]
pub struct ReplicaOptions {
    pub group_size: usize,
    pub block_size: usize,
    pub stat_period: Duration,
    pub prune_budget: usize,
    /// `Duration::ZERO` leaves commits to the test.
    pub commit_interval: Duration,
}

impl Default for ReplicaOptions {
    fn default() -> Self {
        Self {
            group_size: 4,
            block_size: 1,
            stat_period: Duration::from_secs(10),
            prune_budget: 100,
            commit_interval: Duration::from_millis(10),
        }
    }
}

/// Replica 0 of a group, running its event loop on a background task.
pub struct TestReplica {
    pub client_addr: SocketAddr,
    pub core: Arc<DecisionCore>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<RunSummary>,
}

impl TestReplica {
    /// Configure through the same path as the binary and start the loop.
    pub async fn start(options: ReplicaOptions) -> Self {
        let keys: Vec<SigningKey> = (0..options.group_size).map(|_| random_key()).collect();
        let config = ReplicaConfig {
            block_size: options.block_size,
            stat_period: options.stat_period,
            prune_budget: options.prune_budget,
            commit_interval: options.commit_interval,
            replicas: keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    format!(
                        "127.0.0.1:{};0,{}",
                        10000 + i,
                        hex::encode(key.verifying_key().to_encoded_point(true).as_bytes())
                    )
                })
                .collect(),
            idx: 0,
            privkey: Some(hex::encode(keys[0].to_bytes())),
            ..ReplicaConfig::default()
        };
        let setup = config.resolve().expect("fixture config must resolve");

        let mut replica = Replica::start(setup).await.expect("replica must start");
        let port = replica.client_addr().expect("gateway is bound").port();
        let core = replica.core();

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { replica.run(rx).await });

        Self {
            client_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            core,
            shutdown,
            handle,
        }
    }

    pub async fn client(&self) -> GatewayClient {
        GatewayClient::connect(self.client_addr)
            .await
            .expect("client must connect")
    }

    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) -> RunSummary {
        let _ = self.shutdown.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("replica did not stop")
            .expect("replica task panicked")
    }
}
