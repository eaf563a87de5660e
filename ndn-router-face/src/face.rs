//! The transport-agnostic face handle and its events.

use crate::{next_face_id, FaceId, MAX_DECODE_ERRORS, SEND_QUEUE_LIMIT};
use bytes::Bytes;
use log::{debug, warn};
use ndn_router_common::ndn::Packet;
use ndn_router_common::Error;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Events emitted by faces and master faces.
///
/// All events flow to the router over a single channel, which is what
/// serializes the data plane: handlers run one at a time on the router's
/// dispatch loop, so the router's tables need no locking.
#[derive(Debug, Clone)]
pub enum FaceEvent {
    /// A master face accepted or synthesized a new child face.
    NewFace {
        master_id: FaceId,
        face: Arc<Face>,
    },

    /// An Interest arrived on a face.
    Interest {
        face: Arc<Face>,
        interest: ndn_router_common::ndn::Interest,
    },

    /// A Data packet arrived on a face.
    Data {
        face: Arc<Face>,
        data: ndn_router_common::ndn::Data,
    },

    /// The face failed and will emit nothing further. `master_id` is set
    /// when the face was owned by a master face.
    FaceError {
        face: Arc<Face>,
        master_id: Option<FaceId>,
    },
}

/// Transport layer of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    Tcp,
    Udp,
}

/// Lifecycle of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceState {
    Opening,
    Open,
    Closed,
}

const STATE_OPENING: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// One bidirectional NDN packet channel.
///
/// The handle is shared between the router (which sends on it) and the I/O
/// tasks behind it (which deliver inbound packets as [`FaceEvent`]s).
/// Sending never blocks: packets go into a bounded queue and a face whose
/// queue overflows is torn down with a `FaceError`.
#[derive(Debug)]
pub struct Face {
    id: FaceId,
    kind: FaceKind,
    remote: SocketAddr,
    state: AtomicU8,
    failed: AtomicBool,
    outbound: mpsc::Sender<Bytes>,
    closed_tx: watch::Sender<bool>,
}

impl Face {
    pub(crate) fn new(kind: FaceKind, remote: SocketAddr) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (outbound, outbound_rx) = mpsc::channel(SEND_QUEUE_LIMIT);
        let (closed_tx, _) = watch::channel(false);
        let face = Arc::new(Self {
            id: next_face_id(),
            kind,
            remote,
            state: AtomicU8::new(STATE_OPENING),
            failed: AtomicBool::new(false),
            outbound,
            closed_tx,
        });
        (face, outbound_rx)
    }

    /// A face detached from any socket. Packets sent on it show up, wire
    /// encoded, on the returned receiver. Used for in-process endpoints and
    /// by the router's unit tests.
    pub fn local(remote: SocketAddr) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (face, outbound_rx) = Self::new(FaceKind::Udp, remote);
        face.set_open();
        (face, outbound_rx)
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn state(&self) -> FaceState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPENING => FaceState::Opening,
            STATE_OPEN => FaceState::Open,
            _ => FaceState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_CLOSED
    }

    /// Marks the face open once its transport is wired up. A face closed
    /// while still opening stays closed.
    pub(crate) fn set_open(&self) {
        let _ = self.state.compare_exchange(
            STATE_OPENING,
            STATE_OPEN,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Enqueues an outbound packet.
    pub fn send(&self, packet: &Packet) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Face(format!("face {} is closed", self.id)));
        }
        match self.outbound.try_send(packet.to_bytes()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "[Face {}] send queue exceeded {} packets, closing",
                    self.id, SEND_QUEUE_LIMIT
                );
                self.fail();
                Err(Error::Face(format!("face {} send queue overflow", self.id)))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.close();
                Err(Error::Face(format!("face {} transport is gone", self.id)))
            }
        }
    }

    /// Tears the face down without flagging an error (operator-initiated).
    pub fn close(&self) {
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
        let _ = self.closed_tx.send(true);
    }

    /// Tears the face down because of an error. The owning I/O task picks
    /// the flag up via [`Face::take_failure`] and emits one `FaceError`.
    pub(crate) fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
        self.close();
    }

    /// Consumes the failure flag, guaranteeing at most one error event.
    pub(crate) fn take_failure(&self) -> bool {
        self.failed.swap(false, Ordering::SeqCst)
    }

    /// A watch that flips to `true` when the face closes.
    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }
}

/// Decodes one received frame and forwards it as an event.
///
/// Tolerates up to [`MAX_DECODE_ERRORS`] consecutive malformed packets
/// before failing the face. Returns `false` once the event channel is gone
/// and the I/O task should stop.
pub(crate) async fn deliver(
    face: &Arc<Face>,
    frame: &[u8],
    events: &mpsc::Sender<FaceEvent>,
    decode_errors: &mut u32,
) -> bool {
    match Packet::from_bytes(frame) {
        Ok(Packet::Interest(interest)) => {
            *decode_errors = 0;
            events
                .send(FaceEvent::Interest {
                    face: face.clone(),
                    interest,
                })
                .await
                .is_ok()
        }
        Ok(Packet::Data(data)) => {
            *decode_errors = 0;
            events
                .send(FaceEvent::Data {
                    face: face.clone(),
                    data,
                })
                .await
                .is_ok()
        }
        Err(e) => {
            *decode_errors += 1;
            warn!(
                "[Face {}] dropping malformed packet ({} consecutive): {}",
                face.id(),
                decode_errors,
                e
            );
            if *decode_errors >= MAX_DECODE_ERRORS {
                debug!("[Face {}] too many decode failures, closing", face.id());
                face.fail();
            }
            true
        }
    }
}
