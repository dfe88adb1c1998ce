//! Domain types for the replica core.

pub mod config;
pub mod decision;
pub mod error;

pub use config::CoreConfig;
pub use decision::{CommitSummary, Decision, DecisionAbandoned};
pub use error::{CoreError, CoreResult};
