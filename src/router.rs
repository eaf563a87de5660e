//! The router core.
//!
//! One task owns every table. Face events, command datagrams and the
//! registration timeout all funnel into a single `select!` loop, so the
//! handlers below run serialized and the PIT, FIB, pending-request and
//! egress tables need no locking.

use crate::command::{
    AddFaceCmd, Command, DelFaceCmd, EditConfigCmd, Layer, ListCmd, ReplyCmd, RouteCmd,
    MAX_COMMAND_SIZE,
};
use crate::config::Settings;
use crate::fib::Fib;
use crate::pending::{PendingRequest, PendingRequests, MANAGER_TIMEOUT};
use crate::pit::Pit;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use log::{debug, error, info, warn};
use ndn_router_common::keychain::KeyChain;
use ndn_router_common::metrics::RouterMetrics;
use ndn_router_common::ndn::{
    control_response_success, Data, Interest, Name, Packet, SignatureInfo,
};
use ndn_router_common::tlv::{self, TlvElement};
use ndn_router_face::{
    Face, FaceEvent, FaceId, TcpFace, TcpMasterFace, UdpFace, UdpMasterFace,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Face events buffered towards the dispatch loop.
const EVENT_QUEUE_LIMIT: usize = 1024;

/// An NDN forwarder: faces in, PIT/FIB dispatch, faces out, plus the UDP
/// JSON control plane and the prefix-registration workflow.
pub struct Router {
    name: String,
    check_prefix: bool,
    manager_endpoint: Option<SocketAddr>,

    pit: Pit,
    fib: Fib,
    pending: PendingRequests,
    egress: HashMap<FaceId, Arc<Face>>,
    keychain: KeyChain,
    metrics: Arc<RouterMetrics>,

    command_socket: Arc<UdpSocket>,
    remote_command_endpoint: Option<SocketAddr>,

    events_tx: mpsc::Sender<FaceEvent>,
    events_rx: Option<mpsc::Receiver<FaceEvent>>,

    tcp_listen_addr: SocketAddr,
    udp_listen_addr: SocketAddr,
    command_addr: SocketAddr,
}

impl Router {
    /// Binds the master faces and the command socket and wires everything
    /// up. The router does nothing until [`Router::run`] is awaited.
    pub async fn new(settings: Settings) -> Result<Self> {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

        let command_socket = UdpSocket::bind(SocketAddr::new(any, settings.command_port))
            .await
            .context("Failed to bind the command socket")?;
        let command_addr = command_socket.local_addr()?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_LIMIT);

        let tcp_master = TcpMasterFace::bind(SocketAddr::new(any, settings.listen_port))
            .await
            .context("Failed to bind the TCP master face")?;
        let tcp_listen_addr = tcp_master.local_addr()?;

        let udp_master = UdpMasterFace::bind(
            SocketAddr::new(any, settings.listen_port),
            settings.max_udp_children,
        )
        .await
        .context("Failed to bind the UDP master face")?;
        let udp_listen_addr = udp_master.local_addr()?;

        tcp_master.listen(events_tx.clone());
        udp_master.listen(events_tx.clone());

        let manager_endpoint = match (&settings.manager_address, settings.manager_port) {
            (Some(address), Some(port)) => {
                let ip: IpAddr = address
                    .parse()
                    .with_context(|| format!("Invalid manager address {:?}", address))?;
                Some(SocketAddr::new(ip, port))
            }
            _ => None,
        };

        info!(
            "[{}] NDN traffic on port {} (tcp/udp), commands on udp port {}",
            settings.name,
            tcp_listen_addr.port(),
            command_addr.port()
        );

        Ok(Self {
            name: settings.name,
            check_prefix: settings.check_prefix,
            manager_endpoint,
            pit: Pit::new(settings.pit_capacity),
            fib: Fib::new(),
            pending: PendingRequests::new(),
            egress: HashMap::new(),
            keychain: KeyChain::new(),
            metrics: Arc::new(RouterMetrics::new()),
            command_socket: Arc::new(command_socket),
            remote_command_endpoint: None,
            events_tx,
            events_rx: Some(events_rx),
            tcp_listen_addr,
            udp_listen_addr,
            command_addr,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tcp_listen_addr(&self) -> SocketAddr {
        self.tcp_listen_addr
    }

    pub fn udp_listen_addr(&self) -> SocketAddr {
        self.udp_listen_addr
    }

    pub fn command_addr(&self) -> SocketAddr {
        self.command_addr
    }

    pub fn metrics(&self) -> Arc<RouterMetrics> {
        self.metrics.clone()
    }

    /// The dispatch loop. Runs until the process is shut down.
    pub async fn run(mut self) -> Result<()> {
        let mut events_rx = self
            .events_rx
            .take()
            .context("Router::run called twice")?;
        let command_socket = self.command_socket.clone();
        let mut buf = vec![0u8; MAX_COMMAND_SIZE];

        loop {
            let deadline = self.pending.next_deadline();
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.handle_face_event(event).await,
                    None => break,
                },
                received = command_socket.recv_from(&mut buf) => match received {
                    Ok((n, source)) => self.handle_command_datagram(&buf[..n], source).await,
                    Err(e) => error!("command socket error: {}", e),
                },
                _ = deadline_sleep(deadline) => {
                    let expired = self.pending.expire(Instant::now());
                    if expired > 0 {
                        debug!("{} registration request(s) timed out without a manager reply", expired);
                        self.metrics.registrations_timed_out.add(expired as u64);
                    }
                }
            }
        }
        Ok(())
    }

    /* ------------------------------------------------------------ *
     * Data plane
     * ------------------------------------------------------------ */

    async fn handle_face_event(&mut self, event: FaceEvent) {
        match event {
            FaceEvent::NewFace { master_id, face } => {
                info!(
                    "new face with ID = {} from master face with ID = {}",
                    face.id(),
                    master_id
                );
                self.metrics.faces_created.increment();
            }
            FaceEvent::Interest { face, interest } => self.handle_interest(face, interest).await,
            FaceEvent::Data { face, data } => self.handle_data(face, data),
            FaceEvent::FaceError { face, master_id } => {
                self.handle_face_error(face, master_id).await
            }
        }
    }

    async fn handle_interest(&mut self, face: Arc<Face>, interest: Interest) {
        self.metrics.interests_received.increment();
        if is_command_name(&interest.name) {
            self.handle_command_interest(face, interest).await;
            return;
        }

        if self.pit.insert(&interest, &face, Instant::now()) {
            self.metrics.pit_size.set(self.pit.len() as u64);
            let next_hops = self.fib.get(&interest.name);
            if next_hops.is_empty() {
                debug!("no route for {}, interest stays pending", interest.name);
                return;
            }
            let packet = Packet::Interest(interest);
            for hop in next_hops {
                if let Err(e) = hop.send(&packet) {
                    debug!("forwarding on face {} failed: {}", hop.id(), e);
                } else {
                    self.metrics.interests_forwarded.increment();
                }
            }
        } else {
            self.metrics.interests_aggregated.increment();
            debug!(
                "aggregated duplicate interest {} nonce {:#010x} onto the pending entry",
                interest.name, interest.nonce
            );
        }
    }

    fn handle_data(&mut self, face: Arc<Face>, data: Data) {
        self.metrics.data_received.increment();
        if self.check_prefix && !self.fib.is_prefix(face.id(), &data.name) {
            debug!(
                "dropping data {} from face {} without a covering prefix",
                data.name,
                face.id()
            );
            self.metrics.data_unauthorized.increment();
            return;
        }

        let consumers = self.pit.get(&data, Instant::now());
        self.metrics.pit_size.set(self.pit.len() as u64);
        if consumers.is_empty() {
            debug!("unsolicited data {}, dropped", data.name);
            return;
        }
        let packet = Packet::Data(data);
        for consumer in consumers {
            if let Err(e) = consumer.send(&packet) {
                debug!("delivery on face {} failed: {}", consumer.id(), e);
            } else {
                self.metrics.data_sent.increment();
            }
        }
    }

    async fn handle_face_error(&mut self, face: Arc<Face>, master_id: Option<FaceId>) {
        self.metrics.faces_failed.increment();
        match master_id {
            Some(master_id) => {
                error!(
                    "face with ID = {} from master face with ID = {} can't process normally",
                    face.id(),
                    master_id
                );
                if let Some(endpoint) = self.remote_command_endpoint {
                    let report = json!({
                        "name": self.name,
                        "type": "report",
                        "action": "producer_disconnection",
                        "face_id": face.id(),
                    });
                    self.send_json(&report, endpoint).await;
                }
            }
            None => {
                error!("face with ID = {} can't process normally", face.id());
                self.egress.remove(&face.id());
            }
        }
        // FIB entries are left for the operator (del_route); the dead face
        // stops resolving and its slots fall out lazily.
    }

    /* ------------------------------------------------------------ *
     * Registration workflow
     * ------------------------------------------------------------ */

    async fn handle_command_interest(&mut self, face: Arc<Face>, interest: Interest) {
        if !is_register_name(&interest.name) {
            debug!("ignoring command interest {}", interest.name);
            return;
        }
        let Some(prefix) = registered_prefix(&interest.name) else {
            debug!("dropping register interest with a malformed prefix block");
            return;
        };

        info!(
            "face with ID = {} wants to register {} name prefix",
            face.id(),
            prefix
        );
        self.metrics.registrations_received.increment();

        let Some(manager) = self.manager_endpoint else {
            self.on_manager_validation(&face, &interest, &prefix, true);
            return;
        };

        let Some((signature_info, signature)) = registration_signature(&interest.name) else {
            debug!("dropping register interest with a malformed signature");
            return;
        };
        let Some(key_name) = signature_info.key_locator else {
            debug!("dropping register interest without a key locator");
            return;
        };

        // The signed message is the name without its two signature
        // components, as raw component bytes.
        let message_name = interest.name.prefix(interest.name.len() - 2);
        let message = BASE64.encode(message_name.to_tlv().value);

        let deadline = Instant::now() + MANAGER_TIMEOUT;
        let id = self.pending.insert(PendingRequest {
            face: Arc::downgrade(&face),
            interest: interest.clone(),
            prefix: prefix.clone(),
            deadline,
        });

        let request = json!({
            "name": self.name,
            "type": "request",
            "id": id,
            "action": "route_registration",
            "face_id": face.id(),
            "prefix": prefix.to_string(),
            "message": message,
            "key_name": key_name.to_string(),
            "signature_type": signature_info.signature_type.to_string(),
            "signature": BASE64.encode(&signature),
        });
        self.send_json(&request, manager).await;
    }

    fn on_manager_validation(
        &mut self,
        face: &Arc<Face>,
        interest: &Interest,
        prefix: &Name,
        accepted: bool,
    ) {
        if accepted {
            info!(
                "{} name prefix accepted by manager for face with ID = {}",
                prefix,
                face.id()
            );
            let mut data = Data::new(interest.name.clone(), control_response_success());
            data.freshness_ms = Some(0);
            self.keychain.sign(&mut data);
            if let Err(e) = face.send(&Packet::Data(data)) {
                warn!("registration reply on face {} failed: {}", face.id(), e);
            }
            self.fib.insert(face, prefix);
            self.metrics.registrations_accepted.increment();
        } else {
            info!(
                "{} name prefix refused by manager for face with ID = {}",
                prefix,
                face.id()
            );
            self.metrics.registrations_refused.increment();
        }
    }

    /* ------------------------------------------------------------ *
     * Control plane
     * ------------------------------------------------------------ */

    async fn handle_command_datagram(&mut self, datagram: &[u8], source: SocketAddr) {
        // Replies and reports go to whoever spoke to us last.
        self.remote_command_endpoint = Some(source);
        self.metrics.commands_received.increment();

        let Some(command) = Command::parse(datagram) else {
            self.metrics.commands_dropped.increment();
            return;
        };

        match command {
            Command::Reply(cmd) => self.command_reply(cmd),
            Command::EditConfig(cmd) => self.command_edit_config(cmd).await,
            Command::AddFace(cmd) => self.command_add_face(cmd).await,
            Command::DelFace(cmd) => self.command_del_face(cmd).await,
            Command::AddRoute(cmd) => self.command_add_route(cmd).await,
            Command::DelRoute(cmd) => self.command_del_route(cmd).await,
            Command::List(cmd) => self.command_list(cmd).await,
        }
    }

    fn command_reply(&mut self, cmd: ReplyCmd) {
        let Some(request) = self.pending.resolve(cmd.id) else {
            debug!("reply for unknown or expired request id {}", cmd.id);
            return;
        };
        let Some(face) = request.face.upgrade() else {
            debug!("registering face for request {} is gone", cmd.id);
            return;
        };
        if face.is_closed() {
            debug!("registering face {} closed before the manager answered", face.id());
            return;
        }
        self.on_manager_validation(&face, &request.interest, &request.prefix, cmd.result);
    }

    async fn command_edit_config(&mut self, cmd: EditConfigCmd) {
        let mut changes: Vec<&str> = Vec::new();

        if let (Some(address), Some(port)) = (&cmd.manager_address, cmd.manager_port) {
            let ip: IpAddr = match address.parse() {
                Ok(ip) => ip,
                Err(_) => {
                    debug!("dropping edit_config with invalid manager address {:?}", address);
                    return;
                }
            };
            let endpoint = SocketAddr::new(ip, port);
            if self.manager_endpoint != Some(endpoint) {
                self.manager_endpoint = Some(endpoint);
                changes.push("manager_endpoint");
            }
        }

        if let Some(check_prefix) = cmd.check_prefix {
            if check_prefix != self.check_prefix {
                self.check_prefix = check_prefix;
                changes.push("check_prefix");
            }
        }

        let reply = json!({
            "name": self.name,
            "type": "reply",
            "id": cmd.id,
            "action": "edit_config",
            "changes": changes,
        });
        self.send_reply(reply).await;
    }

    async fn command_add_face(&mut self, cmd: AddFaceCmd) {
        let ip: IpAddr = match cmd.address.parse() {
            Ok(ip) => ip,
            Err(_) => {
                debug!("dropping add_face with invalid address {:?}", cmd.address);
                return;
            }
        };
        let remote = SocketAddr::new(ip, cmd.port);
        let face = match cmd.layer {
            Layer::Tcp => TcpFace::dial(remote, self.events_tx.clone()),
            Layer::Udp => UdpFace::dial(remote, self.events_tx.clone()),
        };
        info!("new egress face with ID = {} towards {}", face.id(), remote);
        self.metrics.faces_created.increment();
        let face_id = face.id();
        self.egress.insert(face_id, face);

        let reply = json!({
            "name": self.name,
            "type": "reply",
            "id": cmd.id,
            "action": "add_face",
            "face_id": face_id,
        });
        self.send_reply(reply).await;
    }

    async fn command_del_face(&mut self, cmd: DelFaceCmd) {
        let removed = self.egress.remove(&cmd.face_id);
        if let Some(face) = &removed {
            face.close();
            info!("egress face with ID = {} removed", face.id());
        }

        let reply = json!({
            "name": self.name,
            "type": "reply",
            "id": cmd.id,
            "action": "del_face",
            "face_id": cmd.face_id,
            "status": removed.is_some(),
        });
        self.send_reply(reply).await;
    }

    async fn command_add_route(&mut self, cmd: RouteCmd) {
        let reply = match self.route_target(&cmd) {
            Ok(face) => {
                for prefix in &cmd.prefixes {
                    let name_prefix = Name::from_string(prefix);
                    self.fib.insert(&face, &name_prefix);
                    info!(
                        "{} name added by manager for face with ID = {}",
                        name_prefix,
                        face.id()
                    );
                }
                self.route_reply(cmd.id, "add_route", None)
            }
            Err(reason) => self.route_reply(cmd.id, "add_route", Some(reason)),
        };
        self.send_reply(reply).await;
    }

    async fn command_del_route(&mut self, cmd: RouteCmd) {
        let reply = match self.route_target(&cmd) {
            Ok(face) => {
                for prefix in &cmd.prefixes {
                    let name_prefix = Name::from_string(prefix);
                    self.fib.remove(face.id(), &name_prefix);
                    info!(
                        "{} name removed by manager for face with ID = {}",
                        name_prefix,
                        face.id()
                    );
                }
                self.route_reply(cmd.id, "del_route", None)
            }
            Err(reason) => self.route_reply(cmd.id, "del_route", Some(reason)),
        };
        self.send_reply(reply).await;
    }

    /// Validates a route command against the egress table.
    fn route_target(&self, cmd: &RouteCmd) -> std::result::Result<Arc<Face>, &'static str> {
        if cmd.prefixes.is_empty() {
            return Err("empty prefix list");
        }
        self.egress
            .get(&cmd.face_id)
            .cloned()
            .ok_or("unknown face id")
    }

    fn route_reply(&self, id: u32, action: &str, failure: Option<&str>) -> Value {
        match failure {
            None => json!({
                "name": self.name,
                "type": "reply",
                "id": id,
                "action": action,
                "status": "success",
            }),
            Some(reason) => json!({
                "name": self.name,
                "type": "reply",
                "id": id,
                "action": action,
                "status": "fail",
                "reason": reason,
            }),
        }
    }

    async fn command_list(&mut self, cmd: ListCmd) {
        let reply = json!({
            "name": self.name,
            "type": "reply",
            "id": cmd.id,
            "action": "list",
            "table": {
                "type": "fib",
                "tree": self.fib.to_json(),
            },
        });
        self.send_reply(reply).await;
    }

    async fn send_reply(&self, reply: Value) {
        if let Some(endpoint) = self.remote_command_endpoint {
            self.send_json(&reply, endpoint).await;
        }
    }

    /// Best-effort datagram; a full send buffer just drops it.
    async fn send_json(&self, value: &Value, target: SocketAddr) {
        if let Err(e) = self
            .command_socket
            .send_to(value.to_string().as_bytes(), target)
            .await
        {
            debug!("best-effort datagram to {} failed: {}", target, e);
        }
    }
}

async fn deadline_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => futures::future::pending().await,
    }
}

/// Command interests live under `/localhost` or `/localhop`.
fn is_command_name(name: &Name) -> bool {
    matches!(name.get(0), Some(c) if c.as_bytes().as_ref() == b"localhost"
        || c.as_bytes().as_ref() == b"localhop")
}

/// `/localhost/nfd/rib/register/<prefix>/<signed-info>/<signature>`
fn is_register_name(name: &Name) -> bool {
    name.len() >= 7
        && matches!(name.get(1), Some(c) if c.as_bytes().as_ref() == b"nfd")
        && matches!(name.get(2), Some(c) if c.as_bytes().as_ref() == b"rib")
        && matches!(name.get(3), Some(c) if c.as_bytes().as_ref() == b"register")
}

/// The prefix to register: name component 4 decoded as a wire Name.
fn registered_prefix(name: &Name) -> Option<Name> {
    let block = name.get(4)?;
    Name::from_wire(block.as_bytes()).ok()
}

/// The signed-info and signature blocks riding in the last two components.
fn registration_signature(name: &Name) -> Option<(SignatureInfo, Bytes)> {
    let info_block = name.get(name.len() - 2)?;
    let signature_info = SignatureInfo::from_wire(info_block.as_bytes()).ok()?;

    let value_block = name.get(name.len() - 1)?;
    let mut buf: &[u8] = value_block.as_bytes();
    let element = TlvElement::decode(&mut buf).ok()?;
    if element.tlv_type != tlv::TLV_SIGNATURE_VALUE {
        return None;
    }
    Some((signature_info, element.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use ndn_router_common::ndn::NameComponent;

    /// Builds `/localhost/nfd/rib/register/<prefix>/<sig-info>/<sig>` the way
    /// a producer's management client would.
    pub(crate) fn registration_name(prefix: &str, key: &str) -> Name {
        let mut name = Name::from_string("/localhost/nfd/rib/register");

        let mut block = BytesMut::new();
        Name::from_string(prefix).to_tlv().encode(&mut block);
        name.push(NameComponent::new(block.freeze()));

        let info = SignatureInfo {
            signature_type: ndn_router_common::ndn::SIGNATURE_DIGEST_SHA256,
            key_locator: Some(Name::from_string(key)),
        };
        let mut info_block = BytesMut::new();
        info.to_tlv().encode(&mut info_block);
        name.push(NameComponent::new(info_block.freeze()));

        let mut sig_block = BytesMut::new();
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, vec![0xAB; 32]).encode(&mut sig_block);
        name.push(NameComponent::new(sig_block.freeze()));

        name
    }

    #[test]
    fn test_command_names_are_recognized() {
        assert!(is_command_name(&Name::from_string("/localhost/nfd/rib/register")));
        assert!(is_command_name(&Name::from_string("/localhop/anything")));
        assert!(!is_command_name(&Name::from_string("/app/localhost")));
    }

    #[test]
    fn test_register_name_shape() {
        let name = registration_name("/svc", "/keys/alice");
        assert!(is_command_name(&name));
        assert!(is_register_name(&name));

        assert!(!is_register_name(&Name::from_string(
            "/localhost/nfd/rib/register"
        )));
        assert!(!is_register_name(&Name::from_string(
            "/localhost/nfd/status/general/a/b/c"
        )));
    }

    #[test]
    fn test_registered_prefix_extraction() {
        let name = registration_name("/svc/video", "/keys/alice");
        assert_eq!(
            registered_prefix(&name).unwrap(),
            Name::from_string("/svc/video")
        );

        // A prefix block that is not a Name TLV parses to nothing.
        let mut broken = Name::from_string("/localhost/nfd/rib/register");
        broken.push(NameComponent::new(&b"garbage"[..]));
        broken.push(NameComponent::new(&b"x"[..]));
        broken.push(NameComponent::new(&b"y"[..]));
        assert!(registered_prefix(&broken).is_none());
    }

    #[test]
    fn test_registration_signature_extraction() {
        let name = registration_name("/svc", "/keys/alice");
        let (info, signature) = registration_signature(&name).unwrap();
        assert_eq!(info.key_locator, Some(Name::from_string("/keys/alice")));
        assert_eq!(signature.len(), 32);
    }
}
