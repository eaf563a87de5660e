//! End-to-end tests driving a router over real sockets.
//!
//! Consumers and producers are plain TCP/UDP peers speaking the NDN wire
//! format; the operator and the manager are UDP peers speaking the JSON
//! command protocol.

use bytes::BytesMut;
use ndn_router::{Router, Settings};
use ndn_router_common::keychain::KeyChain;
use ndn_router_common::ndn::{
    control_response_success, Data, Interest, Name, NameComponent, Packet, SignatureInfo,
    SIGNATURE_DIGEST_SHA256,
};
use ndn_router_common::tlv::{self, TlvElement};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(300);

fn localhost(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

struct TestRouter {
    tcp_addr: SocketAddr,
    command_addr: SocketAddr,
}

async fn start_router(check_prefix: bool) -> TestRouter {
    let settings = Settings {
        name: "test-router".to_string(),
        listen_port: 0,
        command_port: 0,
        check_prefix,
        ..Settings::default()
    };
    let router = Router::new(settings).await.expect("router should start");
    let tcp_addr = localhost(router.tcp_listen_addr().port());
    let command_addr = localhost(router.command_addr().port());
    tokio::spawn(router.run());
    TestRouter {
        tcp_addr,
        command_addr,
    }
}

async fn operator_socket() -> UdpSocket {
    UdpSocket::bind(localhost(0)).await.expect("bind operator")
}

async fn send_command(operator: &UdpSocket, router: &TestRouter, request: Value) -> Value {
    operator
        .send_to(request.to_string().as_bytes(), router.command_addr)
        .await
        .expect("send command");
    recv_json(operator).await.expect("command reply")
}

async fn recv_json(socket: &UdpSocket) -> Option<Value> {
    let mut buf = vec![0u8; 65536];
    let (n, _) = timeout(WAIT, socket.recv_from(&mut buf)).await.ok()?.ok()?;
    serde_json::from_slice(&buf[..n]).ok()
}

async fn expect_no_datagram(socket: &UdpSocket) {
    let mut buf = vec![0u8; 65536];
    assert!(
        timeout(QUIET, socket.recv_from(&mut buf)).await.is_err(),
        "unexpected datagram arrived"
    );
}

async fn write_packet(stream: &mut TcpStream, packet: &Packet) {
    stream
        .write_all(&packet.to_bytes())
        .await
        .expect("write packet");
}

async fn read_packet(stream: &mut TcpStream) -> Packet {
    let mut acc = BytesMut::new();
    loop {
        if let Some(frame_len) = Packet::frame_length(&acc).expect("clean frame") {
            if acc.len() >= frame_len {
                let frame = acc.split_to(frame_len);
                return Packet::from_bytes(&frame).expect("decodable packet");
            }
        }
        let mut buf = [0u8; 4096];
        let n = timeout(WAIT, stream.read(&mut buf))
            .await
            .expect("timed out waiting for a packet")
            .expect("read packet");
        assert!(n > 0, "peer closed while a packet was expected");
        acc.extend_from_slice(&buf[..n]);
    }
}

async fn expect_no_packet(stream: &mut TcpStream) {
    let mut buf = [0u8; 4096];
    assert!(
        timeout(QUIET, stream.read(&mut buf)).await.is_err(),
        "unexpected packet arrived"
    );
}

/// Registers a producer reachable through a dialed egress face and routes
/// `prefixes` to it. Returns the accepted connection and the face id.
async fn egress_producer(
    operator: &UdpSocket,
    router: &TestRouter,
    prefixes: &[&str],
) -> (TcpStream, u64) {
    let listener = TcpListener::bind(localhost(0)).await.expect("bind producer");
    let port = listener.local_addr().unwrap().port();

    let reply = send_command(
        operator,
        router,
        json!({"action":"add_face", "id":1, "layer":"tcp", "address":"127.0.0.1", "port":port}),
    )
    .await;
    assert_eq!(reply["action"], "add_face");
    let face_id = reply["face_id"].as_u64().expect("face id in reply");

    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("router should dial the producer")
        .expect("accept");

    if !prefixes.is_empty() {
        let reply = send_command(
            operator,
            router,
            json!({"action":"add_route", "id":2, "face_id":face_id, "prefixes":prefixes}),
        )
        .await;
        assert_eq!(reply["status"], "success");
    }

    (stream, face_id)
}

fn interest(name: &str, nonce: u32) -> Packet {
    Packet::Interest(
        Interest::new(Name::from_string(name))
            .with_nonce(nonce)
            .with_lifetime(4000),
    )
}

fn data(name: &str, content: &'static [u8]) -> Packet {
    Packet::Data(Data::new(Name::from_string(name), content))
}

/// `/localhost/nfd/rib/register/<prefix>/<sig-info>/<sig>`
fn registration_name(prefix: &str, key: &str) -> Name {
    let mut name = Name::from_string("/localhost/nfd/rib/register");

    let mut block = BytesMut::new();
    Name::from_string(prefix).to_tlv().encode(&mut block);
    name.push(NameComponent::new(block.freeze()));

    let info = SignatureInfo {
        signature_type: SIGNATURE_DIGEST_SHA256,
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

#[tokio::test]
async fn basic_forwarding() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let (mut producer, _) = egress_producer(&operator, &router, &["/app"]).await;

    let mut consumer = TcpStream::connect(router.tcp_addr).await.unwrap();
    write_packet(&mut consumer, &interest("/app/x", 0x01020304)).await;

    match read_packet(&mut producer).await {
        Packet::Interest(received) => {
            assert_eq!(received.name, Name::from_string("/app/x"));
            assert_eq!(received.nonce, 0x01020304);
        }
        other => panic!("producer expected an Interest, got {}", other.packet_type()),
    }

    write_packet(&mut producer, &data("/app/x/v1", b"hi")).await;

    match read_packet(&mut consumer).await {
        Packet::Data(received) => {
            assert_eq!(received.name, Name::from_string("/app/x/v1"));
            assert_eq!(received.content.as_ref(), b"hi");
        }
        other => panic!("consumer expected Data, got {}", other.packet_type()),
    }
}

#[tokio::test]
async fn duplicate_interests_aggregate() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let (mut producer, _) = egress_producer(&operator, &router, &["/app"]).await;

    let mut consumer1 = TcpStream::connect(router.tcp_addr).await.unwrap();
    let mut consumer2 = TcpStream::connect(router.tcp_addr).await.unwrap();

    write_packet(&mut consumer1, &interest("/app/x", 0x11111111)).await;

    // The first copy reaches the producer...
    match read_packet(&mut producer).await {
        Packet::Interest(received) => assert_eq!(received.nonce, 0x11111111),
        other => panic!("expected Interest, got {}", other.packet_type()),
    }

    // ...the second aggregates and is not forwarded again.
    write_packet(&mut consumer2, &interest("/app/x", 0x11111111)).await;
    expect_no_packet(&mut producer).await;

    write_packet(&mut producer, &data("/app/x", b"once")).await;

    for consumer in [&mut consumer1, &mut consumer2] {
        match read_packet(consumer).await {
            Packet::Data(received) => assert_eq!(received.content.as_ref(), b"once"),
            other => panic!("expected Data, got {}", other.packet_type()),
        }
    }
}

#[tokio::test]
async fn longest_prefix_selects_one_producer() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let (mut producer_a, _) = egress_producer(&operator, &router, &["/a"]).await;
    let (mut producer_b, _) = egress_producer(&operator, &router, &["/a/b"]).await;

    let mut consumer = TcpStream::connect(router.tcp_addr).await.unwrap();

    write_packet(&mut consumer, &interest("/a/b/c", 1)).await;
    match read_packet(&mut producer_b).await {
        Packet::Interest(received) => assert_eq!(received.name, Name::from_string("/a/b/c")),
        other => panic!("expected Interest, got {}", other.packet_type()),
    }
    expect_no_packet(&mut producer_a).await;

    write_packet(&mut consumer, &interest("/a/z", 2)).await;
    match read_packet(&mut producer_a).await {
        Packet::Interest(received) => assert_eq!(received.name, Name::from_string("/a/z")),
        other => panic!("expected Interest, got {}", other.packet_type()),
    }
    expect_no_packet(&mut producer_b).await;
}

#[tokio::test]
async fn registration_accepted_by_manager() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let manager = UdpSocket::bind(localhost(0)).await.unwrap();
    let manager_port = manager.local_addr().unwrap().port();

    let reply = send_command(
        &operator,
        &router,
        json!({"action":"edit_config", "id":1, "manager_address":"127.0.0.1", "manager_port":manager_port}),
    )
    .await;
    assert_eq!(reply["changes"], json!(["manager_endpoint"]));

    let mut producer = TcpStream::connect(router.tcp_addr).await.unwrap();
    let reg_name = registration_name("/svc", "/keys/alice");
    write_packet(
        &mut producer,
        &Packet::Interest(Interest::new(reg_name.clone()).with_nonce(77).with_lifetime(4000)),
    )
    .await;

    // The router consults the manager.
    let request = recv_json(&manager).await.expect("manager request");
    assert_eq!(request["action"], "route_registration");
    assert_eq!(request["type"], "request");
    assert_eq!(request["name"], "test-router");
    assert_eq!(request["prefix"], "/svc");
    assert_eq!(request["key_name"], "/keys/alice");
    assert_eq!(request["id"], 0);
    assert!(request["message"].is_string());
    assert!(request["signature"].is_string());

    manager
        .send_to(
            json!({"action":"reply", "id":0, "result":true})
                .to_string()
                .as_bytes(),
            router.command_addr,
        )
        .await
        .unwrap();

    // The producer gets a signed success Data on the registration name.
    match read_packet(&mut producer).await {
        Packet::Data(received) => {
            assert_eq!(received.name, reg_name);
            assert_eq!(received.freshness_ms, Some(0));
            assert_eq!(received.content, control_response_success());
            assert!(KeyChain::new().verify(&received));
        }
        other => panic!("expected Data, got {}", other.packet_type()),
    }

    // The prefix is now routed to the producer.
    let mut consumer = TcpStream::connect(router.tcp_addr).await.unwrap();
    write_packet(&mut consumer, &interest("/svc/ping", 3)).await;
    match read_packet(&mut producer).await {
        Packet::Interest(received) => assert_eq!(received.name, Name::from_string("/svc/ping")),
        other => panic!("expected Interest, got {}", other.packet_type()),
    }
}

#[tokio::test]
async fn registration_refused_by_manager() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let manager = UdpSocket::bind(localhost(0)).await.unwrap();
    let manager_port = manager.local_addr().unwrap().port();

    send_command(
        &operator,
        &router,
        json!({"action":"edit_config", "id":1, "manager_address":"127.0.0.1", "manager_port":manager_port}),
    )
    .await;

    let mut producer = TcpStream::connect(router.tcp_addr).await.unwrap();
    write_packet(
        &mut producer,
        &Packet::Interest(
            Interest::new(registration_name("/svc", "/keys/alice"))
                .with_nonce(78)
                .with_lifetime(4000),
        ),
    )
    .await;

    let request = recv_json(&manager).await.expect("manager request");
    manager
        .send_to(
            json!({"action":"reply", "id":request["id"], "result":false})
                .to_string()
                .as_bytes(),
            router.command_addr,
        )
        .await
        .unwrap();

    // No Data reply, and no route was installed.
    expect_no_packet(&mut producer).await;

    let mut consumer = TcpStream::connect(router.tcp_addr).await.unwrap();
    write_packet(&mut consumer, &interest("/svc/ping", 4)).await;
    expect_no_packet(&mut producer).await;
}

#[tokio::test]
async fn registration_times_out_and_restarts_fresh() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let manager = UdpSocket::bind(localhost(0)).await.unwrap();
    let manager_port = manager.local_addr().unwrap().port();

    send_command(
        &operator,
        &router,
        json!({"action":"edit_config", "id":1, "manager_address":"127.0.0.1", "manager_port":manager_port}),
    )
    .await;

    let mut producer = TcpStream::connect(router.tcp_addr).await.unwrap();
    let register = |nonce: u32| {
        Packet::Interest(
            Interest::new(registration_name("/svc", "/keys/alice"))
                .with_nonce(nonce)
                .with_lifetime(4000),
        )
    };

    write_packet(&mut producer, &register(1)).await;
    let first = recv_json(&manager).await.expect("first manager request");
    assert_eq!(first["id"], 0);

    // Let the 5 s deadline lapse without answering.
    tokio::time::sleep(Duration::from_millis(5500)).await;

    // A late reply to the expired id is discarded.
    manager
        .send_to(
            json!({"action":"reply", "id":0, "result":true})
                .to_string()
                .as_bytes(),
            router.command_addr,
        )
        .await
        .unwrap();
    expect_no_packet(&mut producer).await;

    // Retrying starts a fresh request id.
    write_packet(&mut producer, &register(2)).await;
    let second = recv_json(&manager).await.expect("second manager request");
    assert_eq!(second["id"], 1);
}

#[tokio::test]
async fn check_prefix_gates_unauthorized_data() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let (mut producer, _) = egress_producer(&operator, &router, &["/app"]).await;

    let reply = send_command(
        &operator,
        &router,
        json!({"action":"edit_config", "id":3, "check_prefix":true}),
    )
    .await;
    assert_eq!(reply["changes"], json!(["check_prefix"]));

    // Pending interest for a name the producer holds no prefix for.
    let mut consumer = TcpStream::connect(router.tcp_addr).await.unwrap();
    write_packet(&mut consumer, &interest("/rogue/x", 5)).await;
    write_packet(&mut producer, &data("/rogue/x", b"nope")).await;
    expect_no_packet(&mut consumer).await;

    // Covered names still flow.
    write_packet(&mut consumer, &interest("/app/x", 6)).await;
    match read_packet(&mut producer).await {
        Packet::Interest(_) => {}
        other => panic!("expected Interest, got {}", other.packet_type()),
    }
    write_packet(&mut producer, &data("/app/x", b"fine")).await;
    match read_packet(&mut consumer).await {
        Packet::Data(received) => assert_eq!(received.content.as_ref(), b"fine"),
        other => panic!("expected Data, got {}", other.packet_type()),
    }
}

#[tokio::test]
async fn route_commands_round_trip_and_list() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let (_producer, face_id) = egress_producer(&operator, &router, &[]).await;

    // Route commands validate their target.
    let reply = send_command(
        &operator,
        &router,
        json!({"action":"add_route", "id":4, "face_id":face_id, "prefixes":[]}),
    )
    .await;
    assert_eq!(reply["status"], "fail");
    assert_eq!(reply["reason"], "empty prefix list");

    let reply = send_command(
        &operator,
        &router,
        json!({"action":"add_route", "id":5, "face_id":face_id + 1000, "prefixes":["/app"]}),
    )
    .await;
    assert_eq!(reply["status"], "fail");
    assert_eq!(reply["reason"], "unknown face id");

    // Install two prefixes and observe them in the tree.
    let reply = send_command(
        &operator,
        &router,
        json!({"action":"add_route", "id":6, "face_id":face_id, "prefixes":["/app", "/video/hd"]}),
    )
    .await;
    assert_eq!(reply["status"], "success");

    let reply = send_command(&operator, &router, json!({"action":"list", "id":7})).await;
    assert_eq!(reply["table"]["type"], "fib");
    let tree = &reply["table"]["tree"];
    assert_eq!(tree["component"], "/");
    let children = tree["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["component"], "app");
    assert_eq!(children[0]["faces"], json!([face_id]));
    assert_eq!(children[1]["component"], "video");

    // del_route with identical arguments leaves the FIB empty again.
    let reply = send_command(
        &operator,
        &router,
        json!({"action":"del_route", "id":8, "face_id":face_id, "prefixes":["/app", "/video/hd"]}),
    )
    .await;
    assert_eq!(reply["status"], "success");

    let reply = send_command(&operator, &router, json!({"action":"list", "id":9})).await;
    assert!(reply["table"]["tree"]["children"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn del_face_replies_with_status() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let (_producer, face_id) = egress_producer(&operator, &router, &[]).await;

    let reply = send_command(
        &operator,
        &router,
        json!({"action":"del_face", "id":10, "face_id":face_id}),
    )
    .await;
    assert_eq!(reply["action"], "del_face");
    assert_eq!(reply["face_id"], json!(face_id));
    assert_eq!(reply["status"], json!(true));

    // The face is gone: deleting again fails, as does routing to it.
    let reply = send_command(
        &operator,
        &router,
        json!({"action":"del_face", "id":11, "face_id":face_id}),
    )
    .await;
    assert_eq!(reply["status"], json!(false));

    let reply = send_command(
        &operator,
        &router,
        json!({"action":"add_route", "id":12, "face_id":face_id, "prefixes":["/app"]}),
    )
    .await;
    assert_eq!(reply["status"], "fail");
}

#[tokio::test]
async fn two_identical_add_face_commands_make_two_faces() {
    let router = start_router(false).await;
    let operator = operator_socket().await;
    let listener = TcpListener::bind(localhost(0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut ids = Vec::new();
    for id in [20, 21] {
        let reply = send_command(
            &operator,
            &router,
            json!({"action":"add_face", "id":id, "layer":"tcp", "address":"127.0.0.1", "port":port}),
        )
        .await;
        ids.push(reply["face_id"].as_u64().unwrap());
        let _ = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    }
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn malformed_commands_are_dropped_silently() {
    let router = start_router(false).await;
    let operator = operator_socket().await;

    for raw in [
        &b"{not json"[..],
        &br#"{"action":"list"}"#[..],
        &br#"{"action":"reboot", "id":1}"#[..],
        &br#"{"action":"add_face", "id":1, "layer":"tcp", "address":"127.0.0.1", "port":"oops"}"#[..],
        &br#"{"action":"edit_config", "id":1, "manager_address":"not-an-ip", "manager_port":1}"#[..],
    ] {
        operator.send_to(raw, router.command_addr).await.unwrap();
        expect_no_datagram(&operator).await;
    }

    // The read loop re-armed after every drop.
    let reply = send_command(&operator, &router, json!({"action":"list", "id":30})).await;
    assert_eq!(reply["action"], "list");
}

#[tokio::test]
async fn master_child_failure_is_reported() {
    let router = start_router(false).await;
    let operator = operator_socket().await;

    // Talk to the router once so it knows where the operator lives.
    send_command(&operator, &router, json!({"action":"list", "id":40})).await;

    let consumer = TcpStream::connect(router.tcp_addr).await.unwrap();
    // Make sure the router saw the connection before dropping it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(consumer);

    let report = recv_json(&operator).await.expect("disconnection report");
    assert_eq!(report["type"], "report");
    assert_eq!(report["action"], "producer_disconnection");
    assert_eq!(report["name"], "test-router");
    assert!(report["face_id"].is_u64());
}
