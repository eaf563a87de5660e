//! TCP faces: stream framing, dialed faces and the listening master face.
//!
//! TCP carries NDN packets back to back, so the receive path reads the TLV
//! length header, buffers until a full packet has arrived and re-arms on
//! partial reads.

use crate::face::{deliver, Face, FaceEvent, FaceKind};
use crate::FaceId;
use bytes::{Bytes, BytesMut};
use log::{debug, error, info, warn};
use ndn_router_common::ndn::Packet;
use ndn_router_common::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

/// A dialed (egress) TCP face.
pub struct TcpFace;

impl TcpFace {
    /// Starts connecting to `remote` and returns the face handle right
    /// away. Packets sent before the connection is up are queued; if the
    /// connection fails the face emits a single `FaceError`.
    pub fn dial(remote: SocketAddr, events: mpsc::Sender<FaceEvent>) -> Arc<Face> {
        let (face, outbound_rx) = Face::new(FaceKind::Tcp, remote);
        let io_face = face.clone();
        tokio::spawn(async move {
            match TcpStream::connect(remote).await {
                Ok(stream) => {
                    io_face.set_open();
                    debug!("[Face {}] connected to {}", io_face.id(), remote);
                    run_tcp_face(stream, io_face.clone(), outbound_rx, &events).await;
                }
                Err(e) => {
                    error!("[Face {}] failed to connect to {}: {}", io_face.id(), remote, e);
                    io_face.fail();
                }
            }
            if io_face.take_failure() {
                let _ = events
                    .send(FaceEvent::FaceError {
                        face: io_face,
                        master_id: None,
                    })
                    .await;
            }
        });
        face
    }
}

/// The TCP listening endpoint. Accepted connections become child faces the
/// master owns until they close.
pub struct TcpMasterFace {
    id: FaceId,
    listener: TcpListener,
    children: Arc<Mutex<HashMap<FaceId, Arc<Face>>>>,
}

impl TcpMasterFace {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            id: crate::next_face_id(),
            listener,
            children: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn master_face_id(&self) -> FaceId {
        self.id
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Starts the accept loop. For every accepted connection a child face is
    /// announced with `NewFace` before any of its packets are delivered.
    pub fn listen(self, events: mpsc::Sender<FaceEvent>) {
        let master_id = self.id;
        info!("[MasterFace {}] listening for TCP connections", master_id);
        tokio::spawn(async move {
            loop {
                match self.listener.accept().await {
                    Ok((stream, peer)) => {
                        let (face, outbound_rx) = Face::new(FaceKind::Tcp, peer);
                        face.set_open();
                        info!(
                            "[MasterFace {}] new face {} for {}",
                            master_id,
                            face.id(),
                            peer
                        );
                        self.children.lock().await.insert(face.id(), face.clone());
                        if events
                            .send(FaceEvent::NewFace {
                                master_id,
                                face: face.clone(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }

                        let events = events.clone();
                        let children = self.children.clone();
                        tokio::spawn(async move {
                            run_tcp_face(stream, face.clone(), outbound_rx, &events).await;
                            children.lock().await.remove(&face.id());
                            if face.take_failure() {
                                let _ = events
                                    .send(FaceEvent::FaceError {
                                        face,
                                        master_id: Some(master_id),
                                    })
                                    .await;
                            }
                        });
                    }
                    Err(e) => {
                        error!("[MasterFace {}] accept failed: {}", master_id, e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });
    }
}

/// Drives one TCP connection until the face closes or the peer goes away.
async fn run_tcp_face(
    stream: TcpStream,
    face: Arc<Face>,
    outbound_rx: mpsc::Receiver<Bytes>,
    events: &mpsc::Sender<FaceEvent>,
) {
    let mut closed = face.closed_signal();
    if *closed.borrow() {
        return;
    }

    let (mut reader, writer) = stream.into_split();
    let writer_task = spawn_writer(writer, face.clone(), outbound_rx);

    let mut acc = BytesMut::with_capacity(4096);
    let mut decode_errors = 0u32;
    loop {
        tokio::select! {
            result = reader.read_buf(&mut acc) => match result {
                Ok(0) => {
                    debug!("[Face {}] connection closed by peer", face.id());
                    face.fail();
                    break;
                }
                Ok(_) => {
                    if !drain_frames(&face, &mut acc, events, &mut decode_errors).await {
                        break;
                    }
                    if face.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("[Face {}] read error: {}", face.id(), e);
                    face.fail();
                    break;
                }
            },
            _ = closed.changed() => break,
        }
    }

    face.close();
    writer_task.abort();
}

fn spawn_writer(
    mut writer: tokio::net::tcp::OwnedWriteHalf,
    face: Arc<Face>,
    mut outbound_rx: mpsc::Receiver<Bytes>,
) -> tokio::task::JoinHandle<()> {
    let mut closed = face.closed_signal();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe = outbound_rx.recv() => match maybe {
                    Some(bytes) => {
                        if let Err(e) = writer.write_all(&bytes).await {
                            debug!("[Face {}] write error: {}", face.id(), e);
                            face.fail();
                            break;
                        }
                    }
                    None => break,
                },
                _ = closed.changed() => break,
            }
        }
    })
}

/// Extracts every complete packet frame from the accumulator.
async fn drain_frames(
    face: &Arc<Face>,
    acc: &mut BytesMut,
    events: &mpsc::Sender<FaceEvent>,
    decode_errors: &mut u32,
) -> bool {
    loop {
        match Packet::frame_length(acc) {
            Ok(Some(frame_len)) if acc.len() >= frame_len => {
                let frame = acc.split_to(frame_len);
                if !deliver(face, &frame, events, decode_errors).await {
                    return false;
                }
                if face.is_closed() {
                    return true;
                }
            }
            // Header or body still incomplete; wait for the next read.
            Ok(_) => return true,
            Err(e) => {
                warn!("[Face {}] unrecoverable framing error: {}", face.id(), e);
                face.fail();
                return true;
            }
        }
    }
}
