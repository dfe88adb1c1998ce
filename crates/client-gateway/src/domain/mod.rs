//! Domain types for the client gateway.
//!
//! Configuration, error handling and the pending decision store.

pub mod config;
pub mod error;
pub mod pending;

// Re-exports for convenience
pub use config::{ConfigError, GatewayConfig};
pub use error::{ClientError, GatewayError, ProtocolError};
pub use pending::{PendingDecisionStore, PendingStats, ResolvedDecision};
