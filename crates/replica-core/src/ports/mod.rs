//! Ports of the replica core.

pub mod inbound;

pub use inbound::ReplicaCore;
