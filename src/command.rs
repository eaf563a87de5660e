//! Control-plane command parsing.
//!
//! Every inbound datagram on the command socket is one JSON document. A
//! document missing the `action`/`id` envelope, carrying a wrong-typed
//! field or naming an unknown action is silently dropped; the caller only
//! ever sees well-formed, fully typed commands.

use log::debug;
use ndn_router_face::FaceId;
use serde::Deserialize;
use serde_json::Value;

/// Largest accepted command datagram.
pub const MAX_COMMAND_SIZE: usize = 65536;

#[derive(Debug, Deserialize)]
pub struct ReplyCmd {
    pub id: u32,
    pub result: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditConfigCmd {
    pub id: u32,
    pub manager_address: Option<String>,
    pub manager_port: Option<u16>,
    pub check_prefix: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Tcp,
    Udp,
}

#[derive(Debug, Deserialize)]
pub struct AddFaceCmd {
    pub id: u32,
    pub layer: Layer,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DelFaceCmd {
    pub id: u32,
    pub face_id: FaceId,
}

#[derive(Debug, Deserialize)]
pub struct RouteCmd {
    pub id: u32,
    pub face_id: FaceId,
    pub prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCmd {
    pub id: u32,
}

/// A fully validated control-plane command.
#[derive(Debug)]
pub enum Command {
    Reply(ReplyCmd),
    EditConfig(EditConfigCmd),
    AddFace(AddFaceCmd),
    DelFace(DelFaceCmd),
    AddRoute(RouteCmd),
    DelRoute(RouteCmd),
    List(ListCmd),
}

impl Command {
    /// Parses one command datagram. `None` means drop.
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        let document: Value = match serde_json::from_slice(datagram) {
            Ok(document) => document,
            Err(e) => {
                debug!("dropping malformed command JSON: {}", e);
                return None;
            }
        };

        // The envelope must carry a string action and an unsigned id.
        let action = document.get("action")?.as_str()?.to_string();
        document.get("id")?.as_u64()?;

        let parsed = match action.as_str() {
            "reply" => serde_json::from_value(document).map(Command::Reply),
            "edit_config" => serde_json::from_value(document).map(Command::EditConfig),
            "add_face" => serde_json::from_value(document).map(Command::AddFace),
            "del_face" => serde_json::from_value(document).map(Command::DelFace),
            "add_route" => serde_json::from_value(document).map(Command::AddRoute),
            "del_route" => serde_json::from_value(document).map(Command::DelRoute),
            "list" => serde_json::from_value(document).map(Command::List),
            other => {
                debug!("dropping command with unknown action {:?}", other);
                return None;
            }
        };

        match parsed {
            Ok(command) => Some(command),
            Err(e) => {
                debug!("dropping {} command with invalid fields: {}", action, e);
                None
            }
        }
    }
}
