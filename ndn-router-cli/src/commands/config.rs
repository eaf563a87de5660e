//! Runtime configuration changes for the router CLI

use crate::utils::{exchange, print_reply, CommandContext};
use anyhow::Result;
use log::info;
use serde_json::{json, Map, Value};

/// Apply configuration changes; the reply lists the fields that changed.
pub async fn edit_config(
    ctx: &CommandContext,
    manager_address: Option<String>,
    manager_port: Option<u16>,
    check_prefix: Option<bool>,
) -> Result<()> {
    let mut request = Map::new();
    request.insert("action".to_string(), json!("edit_config"));
    request.insert("id".to_string(), json!(ctx.id));
    if let (Some(address), Some(port)) = (&manager_address, manager_port) {
        request.insert("manager_address".to_string(), json!(address));
        request.insert("manager_port".to_string(), json!(port));
    }
    if let Some(check_prefix) = check_prefix {
        request.insert("check_prefix".to_string(), json!(check_prefix));
    }

    info!("Editing router configuration");
    let reply = exchange(ctx, &Value::Object(request)).await?;

    match reply.get("changes").and_then(|v| v.as_array()) {
        Some(changes) if changes.is_empty() => println!("Nothing changed"),
        Some(changes) => {
            let fields: Vec<&str> = changes.iter().filter_map(|c| c.as_str()).collect();
            println!("Changed: {}", fields.join(", "));
        }
        None => {}
    }
    print_reply(&reply);
    Ok(())
}
