use anyhow::Result;
use clap::Parser;
use log::info;
use ndn_router::{Router, Settings};

/// NDN name router daemon
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[clap(short, long)]
    config: Option<String>,

    /// Router name used in control-plane JSON envelopes
    #[clap(long)]
    name: Option<String>,

    /// Port shared by the TCP and UDP master faces
    #[clap(short, long)]
    port: Option<u16>,

    /// UDP port of the JSON command channel
    #[clap(long)]
    command_port: Option<u16>,

    /// Drop Data from faces without a covering FIB prefix
    #[clap(long)]
    check_prefix: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(name) = cli.name {
        settings.name = name;
    }
    if let Some(port) = cli.port {
        settings.listen_port = port;
    }
    if let Some(command_port) = cli.command_port {
        settings.command_port = command_port;
    }
    if cli.check_prefix {
        settings.check_prefix = true;
    }

    let router = Router::new(settings).await?;
    let metrics = router.metrics();
    let name = router.name().to_string();

    tokio::select! {
        result = router.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("[{}] shutting down: {}", name, metrics.summary());
        }
    }
    Ok(())
}
