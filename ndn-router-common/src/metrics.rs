//! Metrics collection for the name router.
//!
//! Plain atomic counters and gauges, bumped on the data path and dumped as a
//! summary when the router shuts down.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for the router
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct RouterMetrics {
    // Packet processing metrics
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    pub interests_aggregated: Counter,
    pub data_received: Counter,
    pub data_sent: Counter,
    pub data_unauthorized: Counter,

    // PIT metrics
    pub pit_size: Gauge,

    // Registration metrics
    pub registrations_received: Counter,
    pub registrations_accepted: Counter,
    pub registrations_refused: Counter,
    pub registrations_timed_out: Counter,

    // Control plane metrics
    pub commands_received: Counter,
    pub commands_dropped: Counter,

    // Face metrics
    pub faces_created: Counter,
    pub faces_failed: Counter,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-line counters dump for the shutdown log.
    pub fn summary(&self) -> String {
        format!(
            "interests rx/fwd/agg {}/{}/{}, data rx/tx/unauth {}/{}/{}, \
             registrations rx/ok/refused/timeout {}/{}/{}/{}, \
             commands rx/dropped {}/{}, faces created/failed {}/{}",
            self.interests_received.value(),
            self.interests_forwarded.value(),
            self.interests_aggregated.value(),
            self.data_received.value(),
            self.data_sent.value(),
            self.data_unauthorized.value(),
            self.registrations_received.value(),
            self.registrations_accepted.value(),
            self.registrations_refused.value(),
            self.registrations_timed_out.value(),
            self.commands_received.value(),
            self.commands_dropped.value(),
            self.faces_created.value(),
            self.faces_failed.value(),
        )
    }
}
