//! Daemon configuration.
//!
//! Defaults, overlaid by an optional TOML file and `NDN_ROUTER_*`
//! environment variables, overlaid in turn by command-line flags in `main`.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Startup settings for the router daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Router name used in control-plane JSON envelopes.
    pub name: String,

    /// Port shared by the TCP and UDP master faces for NDN traffic.
    pub listen_port: u16,

    /// UDP port of the JSON command channel.
    pub command_port: u16,

    /// Pending Interest Table capacity.
    pub pit_capacity: usize,

    /// Child faces the UDP master face keeps before evicting.
    pub max_udp_children: usize,

    /// Drop Data from faces without a covering FIB prefix.
    pub check_prefix: bool,

    /// Prefix-registration manager endpoint, if any.
    pub manager_address: Option<String>,
    pub manager_port: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "ndn-router".to_string(),
            listen_port: 6363,
            command_port: 6464,
            pit_capacity: crate::pit::DEFAULT_PIT_CAPACITY,
            max_udp_children: ndn_router_face::DEFAULT_MAX_CHILDREN,
            check_prefix: false,
            manager_address: None,
            manager_port: None,
        }
    }
}

impl Settings {
    /// Loads settings from the optional config file and the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("NDN_ROUTER"));
        let raw = builder.build().context("Failed to read configuration")?;
        raw.try_deserialize()
            .context("Failed to parse configuration")
    }
}
