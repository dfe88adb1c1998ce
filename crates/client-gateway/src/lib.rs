//! Client Gateway - command submission and finality responses for a BFT replica.
//!
//! Accepts client connections, decodes submitted commands, verifies them,
//! hands them to the replica core and answers each one with its finality
//! once the core decides it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CLIENT GATEWAY                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  accept task ──┬── reader task (per client) ──┐               │
//! │                └── writer task (per client) ←─┼──────┐        │
//! │                                               ▼      │        │
//! │  ┌─────────────────────────────────────────────────┐ │        │
//! │  │        ClientGateway::turn (loop thread)         │ │        │
//! │  │  REQ_CMD → decode → verify → core.add_command    │ │        │
//! │  │          → core.async_decide → pending store     │─┘        │
//! │  │  CHK_CMD → core.find_cmd → RESP_CMD              │          │
//! │  └─────────────────────────────────────────────────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use client_gateway::{ClientGateway, GatewayConfig};
//!
//! let mut gateway = ClientGateway::bind(GatewayConfig::default(), core).await?;
//! while gateway.turn().await {}
//! ```
//!
//! # Verification
//!
//! The `tx-verify` feature (on by default) checks command signatures before
//! the core sees them. Rejected commands are answered with a finality of
//! height `-1`.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod domain;
pub mod metrics;
pub mod service;
pub mod wire;

// Re-exports
pub use client::GatewayClient;
pub use domain::{
    ClientError, ConfigError, GatewayConfig, GatewayError, PendingDecisionStore, ProtocolError,
};
pub use metrics::{GatewayMetrics, GatewaySnapshot};
pub use service::{verification_enabled, ClientGateway, InboundEvent};
pub use wire::{opcodes, ClientMessage, CommandResponse};
