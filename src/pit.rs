//! Pending Interest Table.
//!
//! Tracks in-flight Interests keyed by (Name, Nonce), aggregating duplicates
//! onto one entry. Ingress faces are held weakly so a failed face never
//! keeps an entry alive. Entries leave the table by Data match, by expiry or
//! by capacity eviction, never through an explicit removal call.

use ndn_router_common::ndn::{Data, Interest, Name};
use ndn_router_face::{Face, FaceId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Entries kept before the oldest one is evicted.
pub const DEFAULT_PIT_CAPACITY: usize = 250;

/// Expiry applied to Interests that carry no lifetime.
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PitKey {
    name: Name,
    nonce: u32,
}

#[derive(Debug)]
struct PitEntry {
    seq: u64,
    expires: Instant,
    ingress: Vec<(FaceId, Weak<Face>)>,
}

#[derive(Debug)]
pub struct Pit {
    capacity: usize,
    next_seq: u64,
    entries: HashMap<PitKey, PitEntry>,
    // Insertion order for eviction; (key, seq) pairs whose seq no longer
    // matches the live entry are stale and skipped.
    order: VecDeque<(PitKey, u64)>,
}

impl Pit {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers an Interest arriving on `face`.
    ///
    /// Returns `true` when this created a fresh entry and the caller should
    /// forward the Interest; `false` when an entry for the same (Name,
    /// Nonce) is still pending and the face was merely aggregated onto it.
    pub fn insert(&mut self, interest: &Interest, face: &Arc<Face>, now: Instant) -> bool {
        let key = PitKey {
            name: interest.name.clone(),
            nonce: interest.nonce,
        };

        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.expires > now {
                if !entry.ingress.iter().any(|(id, _)| *id == face.id()) {
                    entry.ingress.push((face.id(), Arc::downgrade(face)));
                }
                return false;
            }
            // The previous round for this key expired; start over.
            self.entries.remove(&key);
        }

        let lifetime = interest.lifetime_ms.unwrap_or(DEFAULT_INTEREST_LIFETIME_MS);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key.clone(),
            PitEntry {
                seq,
                expires: now + Duration::from_millis(lifetime),
                ingress: vec![(face.id(), Arc::downgrade(face))],
            },
        );
        self.order.push_back((key, seq));
        self.evict_over_capacity();
        true
    }

    /// Removes every pending entry whose Name is a prefix of the Data's
    /// name and returns the union of their live ingress faces.
    pub fn get(&mut self, data: &Data, now: Instant) -> Vec<Arc<Face>> {
        let matching: Vec<PitKey> = self
            .entries
            .keys()
            .filter(|key| key.name.is_prefix_of(&data.name))
            .cloned()
            .collect();

        let mut seen: Vec<FaceId> = Vec::new();
        let mut faces = Vec::new();
        for key in matching {
            let Some(entry) = self.entries.remove(&key) else {
                continue;
            };
            if entry.expires <= now {
                continue;
            }
            for (face_id, weak) in entry.ingress {
                if seen.contains(&face_id) {
                    continue;
                }
                seen.push(face_id);
                if let Some(face) = weak.upgrade() {
                    if !face.is_closed() {
                        faces.push(face);
                    }
                }
            }
        }
        faces
    }

    fn evict_over_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            let Some((key, seq)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&key).map(|e| e.seq) == Some(seq) {
                self.entries.remove(&key);
            }
        }
    }
}

impl Default for Pit {
    fn default() -> Self {
        Self::new(DEFAULT_PIT_CAPACITY)
    }
}
