//! Face command implementation for the router CLI

use crate::utils::{exchange, print_reply, CommandContext};
use anyhow::Result;
use log::info;
use serde_json::json;

/// Ask the router to dial a new egress face.
pub async fn add_face(ctx: &CommandContext, layer: &str, address: String, port: u16) -> Result<()> {
    info!("Adding {} face towards {}:{}", layer, address, port);

    let request = json!({
        "action": "add_face",
        "id": ctx.id,
        "layer": layer,
        "address": address,
        "port": port,
    });
    let reply = exchange(ctx, &request).await?;

    if let Some(face_id) = reply.get("face_id").and_then(|v| v.as_u64()) {
        println!("Added face {}", face_id);
    }
    print_reply(&reply);
    Ok(())
}

/// Ask the router to close and forget an egress face.
pub async fn del_face(ctx: &CommandContext, face_id: u64) -> Result<()> {
    info!("Removing face {}", face_id);

    let request = json!({
        "action": "del_face",
        "id": ctx.id,
        "face_id": face_id,
    });
    let reply = exchange(ctx, &request).await?;

    match reply.get("status").and_then(|v| v.as_bool()) {
        Some(true) => println!("Removed face {}", face_id),
        _ => println!("Face {} was not known to the router", face_id),
    }
    print_reply(&reply);
    Ok(())
}
