//! # Replica Test Suite
//!
//! End-to-end tests that run a full replica (core, client gateway,
//! maintenance timer) on `127.0.0.1` and talk to it over TCP.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # Replica harness and key helpers
//!     ├── client_flows.rs    # Submit / check flows through the gateway
//!     └── replica_flows.rs   # Startup, maintenance and shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p replica-tests
//! cargo test -p replica-tests integration::client_flows
//! ```

pub mod integration;
