//! # replica-core
//!
//! The core of a BFT replica as seen from the client gateway.
//!
//! ## Architecture
//!
//! The gateway never talks to a consensus protocol directly. It talks to the
//! [`ReplicaCore`] port, which offers command registration, one-shot decision
//! futures, lookups of decided commands, peer registration and the two
//! maintenance hooks (statistics and pruning).
//!
//! ```text
//!  Gateway ──add_command──→ ┌──────────────────┐ ←──deliver_commit── consensus
//!          ──async_decide─→ │   DecisionCore   │
//!          ←──Decision───── │  queue / waiters │
//!          ──find_cmd─────→ │  decided history │ ←──prune── maintenance
//!                           └──────────────────┘
//! ```
//!
//! [`DecisionCore`] is the in-memory implementation. A consensus protocol
//! reports commits through [`DecisionCore::deliver_commit`]; without one, the
//! stand-alone commit driver cuts blocks from the local queue on a fixed
//! interval so that a single replica is usable on its own.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replica_core::{CoreConfig, DecisionCore, ReplicaCore};
//!
//! let core = DecisionCore::new(CoreConfig::new(0, signing_key), codec);
//! core.add_command(hash, command);
//! let decided = core.async_decide(hash).await?;
//! ```

pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod state;

pub use domain::{CommitSummary, CoreConfig, CoreError, CoreResult, Decision, DecisionAbandoned};
pub use ports::ReplicaCore;
pub use service::DecisionCore;
