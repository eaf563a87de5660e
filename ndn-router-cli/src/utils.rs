//! Utility functions for the router CLI

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

/// Everything a command needs to talk to the router.
pub struct CommandContext {
    pub router: SocketAddr,
    pub id: u32,
    pub timeout_ms: u64,
}

/// Sends one command datagram and waits for the router's reply.
///
/// The router answers to the source endpoint of the most recent datagram,
/// so the ephemeral socket used for sending is the one listened on.
pub async fn exchange(ctx: &CommandContext, request: &Value) -> Result<Value> {
    let bind_addr = if ctx.router.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .context("Failed to bind a local socket")?;

    let payload = request.to_string();
    debug!("-> {}: {}", ctx.router, payload);
    socket
        .send_to(payload.as_bytes(), ctx.router)
        .await
        .context("Failed to send the command")?;

    let mut buf = vec![0u8; 65536];
    let (n, from) = tokio::time::timeout(
        Duration::from_millis(ctx.timeout_ms),
        socket.recv_from(&mut buf),
    )
    .await
    .context("Timed out waiting for the router's reply (a dropped command gets none)")?
    .context("Failed to receive the reply")?;

    debug!("<- {}: {}", from, String::from_utf8_lossy(&buf[..n]));
    serde_json::from_slice(&buf[..n]).context("Router sent malformed JSON")
}

/// Pretty-prints a reply document.
pub fn print_reply(reply: &Value) {
    match serde_json::to_string_pretty(reply) {
        Ok(rendered) => println!("{}", rendered),
        Err(_) => println!("{}", reply),
    }
}
