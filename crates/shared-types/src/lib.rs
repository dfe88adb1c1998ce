//! # Shared Types Crate
//!
//! Value types exchanged between the client gateway, the replica core and
//! clients, as laid out in the replica data model.
//!
//! ## Design Principles
//!
//! - **Content addressing**: a command is identified only by the SHA-256 of
//!   its codec encoding. The hash is the key for lookup, deduplication and
//!   storage.
//! - **Injected codec**: the command wire format belongs to the application.
//!   Consumers receive it as an `Arc<dyn CommandCodec>` instead of
//!   specialising the core.
//! - **Immutable finality**: a command never carries a mutable finality
//!   slot. Decided commands are handed out as [`CommittedCommand`].

pub mod codec;
pub mod entities;
pub mod errors;
pub mod security;

pub use codec::{BincodeCommandCodec, CommandCodec};
pub use entities::*;
pub use errors::*;
pub use security::{sign_command, verify_command};
