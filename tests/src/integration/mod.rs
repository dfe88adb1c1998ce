//! Cross-subsystem flows.

pub mod fixtures;

mod client_flows;
mod replica_flows;
