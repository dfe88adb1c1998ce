//! # Replica Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command-line flags (which may also come from the environment).
//!
//! ## Replica entries
//!
//! Every replica of the group is listed as
//!
//! ```text
//! <ip>:<port>[;<client-port>],<public-key-hex>
//! ```
//!
//! `<ip>:<port>` is the replica's peer address and the public key is a
//! SEC1-encoded secp256k1 key. The client port of the local entry is used
//! for the client gateway unless `--cport` is given.
//!
//! ## Config file format
//!
//! ```toml
//! block_size = 4
//! parent_limit = -1
//! stat_period = "10s"
//! idx = 0
//! privkey = "<secret-hex>"
//! replicas = [
//!     "127.0.0.1:10000;20000,<pubkey-hex>",
//!     "127.0.0.1:10001;20001,<pubkey-hex>",
//! ]
//!
//! [gateway]
//! max_frame_size = 1048576
//! ```

use clap::Parser;
use client_gateway::GatewayConfig;
use k256::ecdsa::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use shared_types::{PeerDescriptor, ReplicaId};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of decided commands kept after each maintenance pass.
pub const DEFAULT_PRUNE_BUDGET: usize = 100;

/// Default period of the maintenance timer.
pub const DEFAULT_STAT_PERIOD: Duration = Duration::from_secs(10);

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised while loading or resolving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid replica info: {0}")]
    InvalidReplicaInfo(String),

    #[error("invalid cport format: {0}")]
    InvalidClientPort(String),

    #[error("replica idx out of range ({idx} of {count} replicas)")]
    IndexOutOfRange { idx: usize, count: usize },

    #[error("client port not specified")]
    MissingClientPort,

    #[error("private key not specified")]
    MissingPrivateKey,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("private key does not match the public key of replica {0}")]
    KeyMismatch(usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("gateway: {0}")]
    Gateway(#[from] client_gateway::ConfigError),
}

// ============================================================================
// COMMAND LINE
// ============================================================================

/// BFT replica
#[derive(Parser, Debug, Default)]
#[command(name = "replica")]
#[command(about = "BFT replica with a client command gateway")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "REPLICA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum number of commands per block
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Maximum number of ancestors a proposal may reference (-1 = unlimited)
    #[arg(long, allow_hyphen_values = true)]
    pub parent_limit: Option<i32>,

    /// Period of statistics output and pruning (e.g. "10s", "500ms")
    #[arg(long, value_parser = parse_duration)]
    pub stat_period: Option<Duration>,

    /// Replica entry "<ip>:<port>[;<cport>],<pubkey-hex>" (repeatable)
    #[arg(long = "replica")]
    pub replicas: Vec<String>,

    /// Index of this replica in the replica list
    #[arg(long, env = "REPLICA_IDX")]
    pub idx: Option<usize>,

    /// Client port, overriding the one in this replica's entry
    #[arg(long)]
    pub cport: Option<u16>,

    /// Hex-encoded secp256k1 secret key of this replica
    #[arg(long, env = "REPLICA_PRIVKEY", hide_env_values = true)]
    pub privkey: Option<String>,

    /// Decided commands kept after each maintenance pass
    #[arg(long)]
    pub prune_budget: Option<usize>,

    /// Period of the stand-alone commit driver, "0s" disables it
    #[arg(long, value_parser = parse_duration)]
    pub commit_interval: Option<Duration>,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

// ============================================================================
// REPLICA CONFIG
// ============================================================================

/// Replica settings as written by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    pub block_size: usize,
    pub parent_limit: i32,
    #[serde(with = "humantime_serde")]
    pub stat_period: Duration,
    pub replicas: Vec<String>,
    pub idx: usize,
    pub cport: Option<u16>,
    pub privkey: Option<String>,
    pub prune_budget: usize,
    #[serde(with = "humantime_serde")]
    pub commit_interval: Duration,
    /// Gateway limits. The listen address is derived from the replica entry.
    pub gateway: GatewayConfig,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            block_size: replica_core::domain::config::DEFAULT_BLOCK_SIZE,
            parent_limit: replica_core::domain::config::DEFAULT_PARENT_LIMIT,
            stat_period: DEFAULT_STAT_PERIOD,
            replicas: Vec::new(),
            idx: 0,
            cport: None,
            privkey: None,
            prune_budget: DEFAULT_PRUNE_BUDGET,
            commit_interval: replica_core::domain::config::DEFAULT_COMMIT_INTERVAL,
            gateway: GatewayConfig::default(),
        }
    }
}

impl ReplicaConfig {
    /// Load the file named by `--config` (if any) and apply the flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override settings with the flags that were given.
    ///
    /// Replica entries from the command line replace the file's list.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(block_size) = cli.block_size {
            self.block_size = block_size;
        }
        if let Some(parent_limit) = cli.parent_limit {
            self.parent_limit = parent_limit;
        }
        if let Some(stat_period) = cli.stat_period {
            self.stat_period = stat_period;
        }
        if !cli.replicas.is_empty() {
            self.replicas = cli.replicas.clone();
        }
        if let Some(idx) = cli.idx {
            self.idx = idx;
        }
        if cli.cport.is_some() {
            self.cport = cli.cport;
        }
        if cli.privkey.is_some() {
            self.privkey = cli.privkey.clone();
        }
        if let Some(prune_budget) = cli.prune_budget {
            self.prune_budget = prune_budget;
        }
        if let Some(commit_interval) = cli.commit_interval {
            self.commit_interval = commit_interval;
        }
    }

    /// Validate everything and produce the runtime setup.
    pub fn resolve(&self) -> Result<ReplicaSetup, ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::InvalidParameter(
                "block_size cannot be 0".into(),
            ));
        }
        if self.stat_period.is_zero() {
            return Err(ConfigError::InvalidParameter(
                "stat_period cannot be 0".into(),
            ));
        }
        self.gateway.validate()?;

        let entries = self
            .replicas
            .iter()
            .map(|entry| ReplicaEntry::parse(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let own = entries.get(self.idx).ok_or(ConfigError::IndexOutOfRange {
            idx: self.idx,
            count: entries.len(),
        })?;
        let replica_id = ReplicaId::try_from(self.idx)
            .map_err(|_| ConfigError::InvalidParameter(format!("idx {} too large", self.idx)))?;

        let client_port = self
            .cport
            .or(own.client_port)
            .ok_or(ConfigError::MissingClientPort)?;

        let signing_key = parse_signing_key(
            self.privkey
                .as_deref()
                .ok_or(ConfigError::MissingPrivateKey)?,
        )?;
        if *signing_key.verifying_key() != own.public_key {
            return Err(ConfigError::KeyMismatch(self.idx));
        }

        let peers = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let id = ReplicaId::try_from(i).map_err(|_| {
                    ConfigError::InvalidParameter(format!("too many replicas ({})", entries.len()))
                })?;
                Ok(PeerDescriptor {
                    id,
                    addr: entry.peer_addr,
                    public_key: entry.public_key,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let gateway = GatewayConfig {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), client_port),
            ..self.gateway.clone()
        };

        Ok(ReplicaSetup {
            replica_id,
            signing_key,
            peer_listen_addr: own.peer_addr,
            gateway,
            peers,
            block_size: self.block_size,
            parent_limit: self.parent_limit,
            stat_period: self.stat_period,
            prune_budget: self.prune_budget,
            commit_interval: Some(self.commit_interval).filter(|d| !d.is_zero()),
        })
    }
}

// ============================================================================
// RESOLVED SETUP
// ============================================================================

/// Validated configuration, ready to start a replica.
#[derive(Clone)]
pub struct ReplicaSetup {
    pub replica_id: ReplicaId,
    pub signing_key: SigningKey,
    pub peer_listen_addr: SocketAddr,
    pub gateway: GatewayConfig,
    /// Every replica of the group, this one included, in index order.
    pub peers: Vec<PeerDescriptor>,
    pub block_size: usize,
    pub parent_limit: i32,
    pub stat_period: Duration,
    pub prune_budget: usize,
    pub commit_interval: Option<Duration>,
}

impl std::fmt::Debug for ReplicaSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaSetup")
            .field("replica_id", &self.replica_id)
            .field("signing_key", &"<redacted>")
            .field("peer_listen_addr", &self.peer_listen_addr)
            .field("gateway", &self.gateway)
            .field("peers", &self.peers.len())
            .field("block_size", &self.block_size)
            .field("parent_limit", &self.parent_limit)
            .field("stat_period", &self.stat_period)
            .field("prune_budget", &self.prune_budget)
            .field("commit_interval", &self.commit_interval)
            .finish()
    }
}

/// One parsed replica entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaEntry {
    pub peer_addr: SocketAddr,
    pub client_port: Option<u16>,
    pub public_key: VerifyingKey,
}

impl ReplicaEntry {
    /// Parse `<ip>:<port>[;<cport>],<pubkey-hex>`.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
        let [address, public_key] = parts[..] else {
            return Err(ConfigError::InvalidReplicaInfo(entry.to_string()));
        };

        let (peer_addr, client_port) = split_ip_port_cport(address)?;
        let public_key = parse_public_key(public_key)?;

        Ok(Self {
            peer_addr,
            client_port,
            public_key,
        })
    }
}

/// Split `<ip>:<port>[;<cport>]` into the peer address and client port.
pub fn split_ip_port_cport(s: &str) -> Result<(SocketAddr, Option<u16>), ConfigError> {
    let parts: Vec<&str> = s.split(';').map(str::trim).collect();
    let (address, client_port) = match parts[..] {
        [address] => (address, None),
        [address, cport] => {
            let port = cport
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidClientPort(s.to_string()))?;
            (address, Some(port))
        }
        _ => return Err(ConfigError::InvalidClientPort(s.to_string())),
    };

    let peer_addr = address
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidReplicaInfo(format!("{}: {}", address, e)))?;
    Ok((peer_addr, client_port))
}

fn parse_public_key(s: &str) -> Result<VerifyingKey, ConfigError> {
    let bytes = hex::decode(s).map_err(|e| ConfigError::InvalidKey(format!("public key: {}", e)))?;
    VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| ConfigError::InvalidKey("public key is not a SEC1 secp256k1 point".into()))
}

fn parse_signing_key(s: &str) -> Result<SigningKey, ConfigError> {
    let bytes = hex::decode(s).map_err(|e| ConfigError::InvalidKey(format!("private key: {}", e)))?;
    if bytes.len() != 32 {
        return Err(ConfigError::InvalidKey(format!(
            "private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    SigningKey::from_slice(&bytes)
        .map_err(|_| ConfigError::InvalidKey("private key is not a valid scalar".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Keypair {
        secret: String,
        public: String,
    }

    fn keypair() -> Keypair {
        let key = SigningKey::random(&mut rand::thread_rng());
        Keypair {
            secret: hex::encode(key.to_bytes()),
            public: hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
        }
    }

    fn config_for(keys: &[Keypair], idx: usize) -> ReplicaConfig {
        ReplicaConfig {
            replicas: keys
                .iter()
                .enumerate()
                .map(|(i, k)| format!("127.0.0.1:{};{},{}", 10000 + i, 20000 + i, k.public))
                .collect(),
            idx,
            privkey: Some(keys[idx].secret.clone()),
            ..ReplicaConfig::default()
        }
    }

    #[test]
    fn test_split_ip_port_cport() {
        let (addr, cport) = split_ip_port_cport("127.0.0.1:10000;20000").unwrap();
        assert_eq!(addr, "127.0.0.1:10000".parse().unwrap());
        assert_eq!(cport, Some(20000));

        let (_, cport) = split_ip_port_cport("127.0.0.1:10000").unwrap();
        assert_eq!(cport, None);

        assert!(matches!(
            split_ip_port_cport("127.0.0.1:10000;x"),
            Err(ConfigError::InvalidClientPort(_))
        ));
        assert!(matches!(
            split_ip_port_cport("127.0.0.1:1;2;3"),
            Err(ConfigError::InvalidClientPort(_))
        ));
    }

    #[test]
    fn test_replica_entry_needs_key() {
        assert!(matches!(
            ReplicaEntry::parse("127.0.0.1:10000;20000"),
            Err(ConfigError::InvalidReplicaInfo(_))
        ));
        assert!(matches!(
            ReplicaEntry::parse("127.0.0.1:10000;20000,zz"),
            Err(ConfigError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_resolve_derives_client_port_from_entry() {
        let keys = vec![keypair(), keypair(), keypair(), keypair()];
        let setup = config_for(&keys, 2).resolve().unwrap();

        assert_eq!(setup.replica_id, 2);
        assert_eq!(setup.gateway.listen_addr.port(), 20002);
        assert!(setup.gateway.listen_addr.ip().is_unspecified());
        assert_eq!(setup.peer_listen_addr, "127.0.0.1:10002".parse().unwrap());
        assert_eq!(setup.peers.len(), 4);
        assert_eq!(setup.peers[3].id, 3);
        assert_eq!(setup.block_size, 1);
        assert_eq!(setup.parent_limit, -1);
        assert_eq!(setup.prune_budget, DEFAULT_PRUNE_BUDGET);
    }

    #[test]
    fn test_cport_flag_wins() {
        let keys = vec![keypair()];
        let mut config = config_for(&keys, 0);
        config.cport = Some(30000);
        assert_eq!(config.resolve().unwrap().gateway.listen_addr.port(), 30000);
    }

    #[test]
    fn test_missing_client_port() {
        let keys = vec![keypair()];
        let mut config = config_for(&keys, 0);
        config.replicas = vec![format!("127.0.0.1:10000,{}", keys[0].public)];
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingClientPort)
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let keys = vec![keypair(), keypair()];
        let mut config = config_for(&keys, 0);
        config.idx = 2;
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::IndexOutOfRange { idx: 2, count: 2 }));
        assert!(err.to_string().starts_with("replica idx out of range"));
    }

    #[test]
    fn test_foreign_private_key_is_refused() {
        let keys = vec![keypair(), keypair()];
        let mut config = config_for(&keys, 0);
        config.privkey = Some(keys[1].secret.clone());
        assert!(matches!(config.resolve(), Err(ConfigError::KeyMismatch(0))));
    }

    #[test]
    fn test_missing_private_key() {
        let keys = vec![keypair()];
        let mut config = config_for(&keys, 0);
        config.privkey = None;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingPrivateKey)
        ));
    }

    #[test]
    fn test_zero_parameters_are_refused() {
        let keys = vec![keypair()];
        let mut config = config_for(&keys, 0);
        config.block_size = 0;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidParameter(_))
        ));

        let mut config = config_for(&keys, 0);
        config.stat_period = Duration::ZERO;
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_commit_interval_disables_driver() {
        let keys = vec![keypair()];
        let mut config = config_for(&keys, 0);
        config.commit_interval = Duration::ZERO;
        assert_eq!(config.resolve().unwrap().commit_interval, None);
    }

    #[test]
    fn test_toml_file_with_cli_overrides() {
        let config = ReplicaConfig::parse(
            r#"
            block_size = 4
            stat_period = "2s"
            prune_budget = 10
            replicas = ["127.0.0.1:10000;20000,00"]

            [gateway]
            outbound_buffer = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.block_size, 4);
        assert_eq!(config.stat_period, Duration::from_secs(2));
        assert_eq!(config.gateway.outbound_buffer, 8);
        assert_eq!(config.parent_limit, -1);

        let cli = Cli::parse_from([
            "replica",
            "--block-size",
            "8",
            "--parent-limit",
            "-1",
            "--stat-period",
            "500ms",
            "--replica",
            "127.0.0.1:10000;20000,aa",
            "--replica",
            "127.0.0.1:10001;20001,bb",
        ]);
        let mut merged = config;
        merged.apply(&cli);
        assert_eq!(merged.block_size, 8);
        assert_eq!(merged.stat_period, Duration::from_millis(500));
        assert_eq!(merged.prune_budget, 10);
        assert_eq!(merged.replicas.len(), 2);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        assert!(matches!(
            ReplicaConfig::parse("block_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
