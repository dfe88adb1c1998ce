//! # Replica Runtime Library
//!
//! Configuration, maintenance and orchestration of a BFT replica. The
//! `replica` binary in `main.rs` is a thin shell around [`Replica`].
//!
//! ## Modules
//!
//! - `config` - layered configuration (defaults, TOML file, CLI flags)
//! - `maintenance` - periodic statistics and pruning
//! - `replica` - startup sequence and the single event loop

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod maintenance;
pub mod replica;

pub use config::{Cli, ConfigError, ReplicaConfig, ReplicaEntry, ReplicaSetup};
pub use maintenance::MaintenanceTimer;
pub use replica::{Replica, RunSummary, RuntimeError};
