//! FIB listing for the router CLI

use crate::utils::{exchange, print_reply, CommandContext};
use anyhow::Result;
use serde_json::{json, Value};

/// Dump the router's FIB tree.
pub async fn list(ctx: &CommandContext) -> Result<()> {
    let request = json!({
        "action": "list",
        "id": ctx.id,
    });
    let reply = exchange(ctx, &request).await?;

    if let Some(tree) = reply.pointer("/table/tree") {
        println!("FIB:");
        render(tree, "");
    }
    print_reply(&reply);
    Ok(())
}

/// Renders a FIB tree node as an indented outline.
fn render(node: &Value, indent: &str) {
    let component = node
        .get("component")
        .and_then(|v| v.as_str())
        .unwrap_or("?");
    let faces: Vec<String> = node
        .get("faces")
        .and_then(|v| v.as_array())
        .map(|faces| faces.iter().filter_map(|f| f.as_u64()).map(|f| f.to_string()).collect())
        .unwrap_or_default();

    if faces.is_empty() {
        println!("{}{}", indent, component);
    } else {
        println!("{}{} -> faces [{}]", indent, component, faces.join(", "));
    }

    if let Some(children) = node.get("children").and_then(|v| v.as_array()) {
        let deeper = format!("{}  ", indent);
        for child in children {
            render(child, &deeper);
        }
    }
}
