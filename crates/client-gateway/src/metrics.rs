//! Gateway counters.
//!
//! Written only from the gateway loop and its connection tasks; read by the
//! orchestrator for the shutdown summary.

use crate::domain::PendingStats;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Client gateway metrics
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Submission counters
    pub commands_submitted: AtomicU64,
    pub commands_rejected: AtomicU64,
    pub commands_malformed: AtomicU64,
    pub checks_answered: AtomicU64,

    // Delivery counters
    pub responses_sent: AtomicU64,
    pub responses_undeliverable: AtomicU64,

    // Connection counters
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,

    // Decision latency (submit to resolution)
    pub total_decision_latency_us: AtomicU64,
    pub decisions_timed: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted submission
    pub fn record_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submission that failed verification
    pub fn record_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame or command that could not be decoded
    pub fn record_malformed(&self) {
        self.commands_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_check(&self) {
        self.checks_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of handing a response to a connection
    pub fn record_response(&self, delivered: bool) {
        if delivered {
            self.responses_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.responses_undeliverable.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_connect(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a decision took to resolve
    pub fn record_decision_latency(&self, waited: Duration) {
        let micros = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX);
        self.total_decision_latency_us
            .fetch_add(micros, Ordering::Relaxed);
        self.decisions_timed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average decision latency in ms
    pub fn average_decision_latency_ms(&self) -> f64 {
        let total = self.total_decision_latency_us.load(Ordering::Relaxed);
        let count = self.decisions_timed.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64 / 1000.0
        }
    }

    /// Point-in-time copy of every counter, joined with the decision
    /// pipeline's counters.
    pub fn snapshot(&self, pending: &PendingStats) -> GatewaySnapshot {
        GatewaySnapshot {
            submitted: self.commands_submitted.load(Ordering::Relaxed),
            rejected: self.commands_rejected.load(Ordering::Relaxed),
            malformed: self.commands_malformed.load(Ordering::Relaxed),
            checks: self.checks_answered.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            responses_undeliverable: self.responses_undeliverable.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            average_decision_latency_ms: self.average_decision_latency_ms(),
            decisions_registered: pending.total_registered.load(Ordering::Relaxed),
            decisions_resolved: pending.total_resolved.load(Ordering::Relaxed),
            decisions_abandoned: pending.total_abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`GatewayMetrics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GatewaySnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub checks: u64,
    pub responses_sent: u64,
    pub responses_undeliverable: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub average_decision_latency_ms: f64,
    pub decisions_registered: u64,
    pub decisions_resolved: u64,
    pub decisions_abandoned: u64,
}

impl fmt::Display for GatewaySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={} rejected={} malformed={} checks={} sent={} undeliverable={} \
             connections={}/{} decisions={}/{} abandoned={} avg_decision={:.2}ms",
            self.submitted,
            self.rejected,
            self.malformed,
            self.checks,
            self.responses_sent,
            self.responses_undeliverable,
            self.connections_closed,
            self.connections_opened,
            self.decisions_resolved,
            self.decisions_registered,
            self.decisions_abandoned,
            self.average_decision_latency_ms
        )
    }
}
