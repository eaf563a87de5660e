//! Transport faces for the NDN name router.
//!
//! A face is one bidirectional NDN packet channel. This crate provides the
//! face handle itself plus the TCP and UDP transports behind it: dialed
//! egress faces, and master (listening) faces that spawn a child face per
//! accepted connection or per distinct remote endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod face;
pub mod tcp;
pub mod udp;

pub use face::{Face, FaceEvent, FaceKind, FaceState};
pub use tcp::{TcpFace, TcpMasterFace};
pub use udp::{UdpFace, UdpMasterFace};

/// Process-unique face identifier, visible in control-plane JSON.
pub type FaceId = u64;

/// Outbound packets queued per face before the face is torn down.
pub const SEND_QUEUE_LIMIT: usize = 1024;

/// Consecutive packet decode failures tolerated before a face is closed.
pub const MAX_DECODE_ERRORS: u32 = 16;

/// Default cap on child faces a UDP master face keeps alive.
pub const DEFAULT_MAX_CHILDREN: usize = 16;

/// Issues face ids from a process-global monotonic counter. Ids are shared
/// between faces and master faces and are never reused within a run.
pub(crate) fn next_face_id() -> FaceId {
    static NEXT_FACE_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_FACE_ID.fetch_add(1, Ordering::SeqCst)
}
