use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;

mod commands;
mod utils;

/// NDN name router Command Line Interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Command endpoint of the router (UDP)
    #[clap(short, long, default_value = "127.0.0.1:6464")]
    router: SocketAddr,

    /// Request id echoed back in the reply
    #[clap(long, default_value = "1")]
    id: u32,

    /// How long to wait for the reply, in milliseconds
    #[clap(long, default_value = "3000")]
    timeout: u64,

    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dial a new egress face
    AddFace {
        /// Transport layer of the face
        #[clap(long, value_enum)]
        layer: FaceLayer,

        /// Remote IP address
        #[clap(long)]
        address: String,

        /// Remote port
        #[clap(long)]
        port: u16,
    },

    /// Close and remove an egress face
    DelFace {
        /// Face to remove
        #[clap(long)]
        face_id: u64,
    },

    /// Point name prefixes at an egress face
    AddRoute {
        /// Face the prefixes route to
        #[clap(long)]
        face_id: u64,

        /// Name prefixes (NDN URI format)
        #[clap(required = true)]
        prefixes: Vec<String>,
    },

    /// Remove name prefixes from an egress face
    DelRoute {
        /// Face the prefixes route to
        #[clap(long)]
        face_id: u64,

        /// Name prefixes (NDN URI format)
        #[clap(required = true)]
        prefixes: Vec<String>,
    },

    /// Dump the router's FIB tree
    List,

    /// Change the router's runtime configuration
    EditConfig {
        /// Manager IP address (requires --manager-port)
        #[clap(long, requires = "manager_port")]
        manager_address: Option<String>,

        /// Manager UDP port
        #[clap(long, requires = "manager_address")]
        manager_port: Option<u16>,

        /// Require Data senders to hold a covering FIB prefix
        #[clap(long)]
        check_prefix: Option<bool>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FaceLayer {
    Tcp,
    Udp,
}

impl FaceLayer {
    fn as_str(self) -> &'static str {
        match self {
            FaceLayer::Tcp => "tcp",
            FaceLayer::Udp => "udp",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let ctx = utils::CommandContext {
        router: cli.router,
        id: cli.id,
        timeout_ms: cli.timeout,
    };

    match cli.command {
        Commands::AddFace {
            layer,
            address,
            port,
        } => commands::face::add_face(&ctx, layer.as_str(), address, port).await,
        Commands::DelFace { face_id } => commands::face::del_face(&ctx, face_id).await,
        Commands::AddRoute { face_id, prefixes } => {
            commands::route::edit_routes(&ctx, "add_route", face_id, prefixes).await
        }
        Commands::DelRoute { face_id, prefixes } => {
            commands::route::edit_routes(&ctx, "del_route", face_id, prefixes).await
        }
        Commands::List => commands::list::list(&ctx).await,
        Commands::EditConfig {
            manager_address,
            manager_port,
            check_prefix,
        } => commands::config::edit_config(&ctx, manager_address, manager_port, check_prefix).await,
    }
}
