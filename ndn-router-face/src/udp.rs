//! UDP faces: one NDN packet per datagram.
//!
//! The master face owns a single socket and demultiplexes inbound datagrams
//! by remote endpoint into child faces it creates lazily, evicting the least
//! recently used child when the set grows past its cap.

use crate::face::{deliver, Face, FaceEvent, FaceKind};
use crate::FaceId;
use bytes::Bytes;
use log::{debug, error, info};
use lru::LruCache;
use ndn_router_common::ndn::MAX_NDN_PACKET_SIZE;
use ndn_router_common::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// A dialed (egress) UDP face on its own connected socket.
pub struct UdpFace;

impl UdpFace {
    /// Binds an ephemeral socket towards `remote` and returns the face
    /// handle right away.
    pub fn dial(remote: SocketAddr, events: mpsc::Sender<FaceEvent>) -> Arc<Face> {
        let (face, mut outbound_rx) = Face::new(FaceKind::Udp, remote);
        let io_face = face.clone();
        tokio::spawn(async move {
            let bind_addr = if remote.is_ipv4() {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
            } else {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
            };
            let socket = match UdpSocket::bind(bind_addr).await {
                Ok(socket) => socket,
                Err(e) => {
                    error!("[Face {}] failed to bind UDP socket: {}", io_face.id(), e);
                    io_face.fail();
                    report_failure(io_face, &events).await;
                    return;
                }
            };
            if let Err(e) = socket.connect(remote).await {
                error!("[Face {}] failed to connect to {}: {}", io_face.id(), remote, e);
                io_face.fail();
                report_failure(io_face, &events).await;
                return;
            }
            io_face.set_open();
            debug!("[Face {}] UDP face towards {}", io_face.id(), remote);

            let mut closed = io_face.closed_signal();
            let mut buf = vec![0u8; 65536];
            let mut decode_errors = 0u32;
            if !*closed.borrow() {
                loop {
                    tokio::select! {
                        result = socket.recv(&mut buf) => match result {
                            Ok(n) if n > MAX_NDN_PACKET_SIZE => {
                                error!(
                                    "[Face {}] dropping oversized {} byte datagram",
                                    io_face.id(), n
                                );
                            }
                            Ok(n) => {
                                if !deliver(&io_face, &buf[..n], &events, &mut decode_errors).await {
                                    break;
                                }
                                if io_face.is_closed() {
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!("[Face {}] recv error: {}", io_face.id(), e);
                                io_face.fail();
                                break;
                            }
                        },
                        maybe = outbound_rx.recv() => match maybe {
                            Some(bytes) => {
                                if let Err(e) = socket.send(&bytes).await {
                                    debug!("[Face {}] send error: {}", io_face.id(), e);
                                    io_face.fail();
                                    break;
                                }
                            }
                            None => break,
                        },
                        _ = closed.changed() => break,
                    }
                }
            }
            io_face.close();
            report_failure(io_face, &events).await;
        });
        face
    }
}

async fn report_failure(face: Arc<Face>, events: &mpsc::Sender<FaceEvent>) {
    if face.take_failure() {
        let _ = events
            .send(FaceEvent::FaceError {
                face,
                master_id: None,
            })
            .await;
    }
}

/// The UDP listening endpoint. One socket; child faces are synthesized per
/// distinct remote endpoint.
pub struct UdpMasterFace {
    id: FaceId,
    socket: Arc<UdpSocket>,
    max_children: NonZeroUsize,
}

struct UdpChild {
    face: Arc<Face>,
    decode_errors: u32,
}

impl UdpMasterFace {
    pub async fn bind(addr: SocketAddr, max_children: usize) -> Result<Self> {
        let max_children = NonZeroUsize::new(max_children)
            .ok_or_else(|| Error::Face("max_children must be at least 1".into()))?;
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            id: crate::next_face_id(),
            socket: Arc::new(socket),
            max_children,
        })
    }

    pub fn master_face_id(&self) -> FaceId {
        self.id
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Starts the demultiplexing loop. Every newly born child face is
    /// announced with `NewFace` before its first packet is delivered.
    pub fn listen(self, events: mpsc::Sender<FaceEvent>) {
        let master_id = self.id;
        info!("[MasterFace {}] listening for UDP datagrams", master_id);
        tokio::spawn(async move {
            let mut children: LruCache<SocketAddr, UdpChild> = LruCache::new(self.max_children);
            let mut buf = vec![0u8; 65536];
            loop {
                let (n, peer) = match self.socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("[MasterFace {}] recv failed: {}", master_id, e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                };
                if n > MAX_NDN_PACKET_SIZE {
                    error!(
                        "[MasterFace {}] dropping oversized {} byte datagram from {}",
                        master_id, n, peer
                    );
                    continue;
                }

                let needs_child = match children.get(&peer) {
                    Some(child) => child.face.is_closed(),
                    None => true,
                };
                if needs_child {
                    let (face, outbound_rx) = Face::new(FaceKind::Udp, peer);
                    face.set_open();
                    info!(
                        "[MasterFace {}] new face {} for {}",
                        master_id,
                        face.id(),
                        peer
                    );
                    tokio::spawn(run_udp_child(
                        self.socket.clone(),
                        peer,
                        face.clone(),
                        outbound_rx,
                        events.clone(),
                        master_id,
                    ));
                    if let Some((old_peer, old)) = children.push(
                        peer,
                        UdpChild {
                            face: face.clone(),
                            decode_errors: 0,
                        },
                    ) {
                        if old_peer != peer {
                            debug!(
                                "[MasterFace {}] evicting idle face {} for {}",
                                master_id,
                                old.face.id(),
                                old_peer
                            );
                            old.face.close();
                        }
                    }
                    if events
                        .send(FaceEvent::NewFace { master_id, face })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }

                if let Some(child) = children.get_mut(&peer) {
                    let face = child.face.clone();
                    if !deliver(&face, &buf[..n], &events, &mut child.decode_errors).await {
                        return;
                    }
                }
            }
        });
    }
}

/// Sends a child face's queued packets out through the shared socket.
async fn run_udp_child(
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    face: Arc<Face>,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    events: mpsc::Sender<FaceEvent>,
    master_id: FaceId,
) {
    let mut closed = face.closed_signal();
    if !*closed.borrow() {
        loop {
            tokio::select! {
                maybe = outbound_rx.recv() => match maybe {
                    Some(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, peer).await {
                            debug!("[Face {}] send to {} failed: {}", face.id(), peer, e);
                            face.fail();
                            break;
                        }
                    }
                    None => break,
                },
                _ = closed.changed() => break,
            }
        }
    }
    face.close();
    if face.take_failure() {
        let _ = events
            .send(FaceEvent::FaceError {
                face,
                master_id: Some(master_id),
            })
            .await;
    }
}
