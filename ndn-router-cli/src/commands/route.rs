//! Route command implementation for the router CLI

use crate::utils::{exchange, print_reply, CommandContext};
use anyhow::Result;
use log::info;
use ndn_router_common::ndn::Name;
use serde_json::json;

/// Add or remove a batch of prefixes on one egress face.
pub async fn edit_routes(
    ctx: &CommandContext,
    action: &str,
    face_id: u64,
    prefixes: Vec<String>,
) -> Result<()> {
    // Normalize the prefixes so `/a//b/` and `/a/b` read the same.
    let prefixes: Vec<String> = prefixes
        .iter()
        .map(|p| Name::from_string(p).to_string())
        .collect();
    info!("{} for face {}: {}", action, face_id, prefixes.join(", "));

    let request = json!({
        "action": action,
        "id": ctx.id,
        "face_id": face_id,
        "prefixes": prefixes,
    });
    let reply = exchange(ctx, &request).await?;

    match reply.get("status").and_then(|v| v.as_str()) {
        Some("success") => println!("{}: ok", action),
        Some("fail") => println!(
            "{}: failed ({})",
            action,
            reply.get("reason").and_then(|v| v.as_str()).unwrap_or("?")
        ),
        _ => {}
    }
    print_reply(&reply);
    Ok(())
}
