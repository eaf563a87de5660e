//! Outstanding requests to the prefix-registration manager.
//!
//! Each outbound `route_registration` request gets a monotonically issued id
//! and a deadline. An entry leaves the table exactly once: either the
//! manager's `reply` resolves it or the deadline expires it; a late reply
//! finds nothing and is discarded.

use ndn_router_common::ndn::{Interest, Name};
use ndn_router_face::Face;
use std::collections::HashMap;
use std::sync::Weak;
use std::time::{Duration, Instant};

/// How long a registration waits for the manager's verdict.
pub const MANAGER_TIMEOUT: Duration = Duration::from_secs(5);

/// The state needed to finish a registration once the manager answers.
#[derive(Debug)]
pub struct PendingRequest {
    pub face: Weak<Face>,
    pub interest: Interest,
    pub prefix: Name,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct PendingRequests {
    next_id: u32,
    entries: HashMap<u32, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files a request and returns its id. Ids start at 0 and are never
    /// reused within a run.
    pub fn insert(&mut self, request: PendingRequest) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.insert(id, request);
        id
    }

    /// Takes the request a manager reply refers to, if it is still pending.
    pub fn resolve(&mut self, id: u32) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// Drops every request whose deadline has passed; returns how many.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, request| request.deadline > now);
        before - self.entries.len()
    }

    /// The soonest deadline, for arming the dispatch loop's timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|request| request.deadline).min()
    }
}
