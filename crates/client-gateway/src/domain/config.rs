//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address client connections are accepted on
    pub listen_addr: SocketAddr,
    /// Largest accepted frame (opcode + body), in bytes
    pub max_frame_size: usize,
    /// Frames queued per connection before responses are dropped
    pub outbound_buffer: usize,
    /// Events queued from all connections towards the gateway loop
    pub inbound_buffer: usize,
    /// Back-off after a failed `accept`
    #[serde(with = "humantime_serde")]
    pub accept_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 20000),
            max_frame_size: 1024 * 1024,
            outbound_buffer: 256,
            inbound_buffer: 4096,
            accept_backoff: Duration::from_millis(100),
        }
    }
}

impl GatewayConfig {
    /// Configuration listening on `listen_addr` with default limits.
    pub fn with_listen_addr(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_frame_size cannot be 0".into(),
            ));
        }

        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "outbound_buffer cannot be 0".into(),
            ));
        }

        if self.inbound_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "inbound_buffer cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
}
