// Command line entry point for a single synchronization node

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use peer_time_sync::logging;
use peer_time_sync::network::{resolve_addr, resolve_host};
use peer_time_sync::{Error, Node, NodeConfig, Result};

#[derive(Parser)]
#[command(name = "peer-time-sync")]
#[command(about = "Leader-rooted peer clock synchronization over UDP", long_about = None)]
struct Cli {
    /// Local address to listen on
    #[arg(short = 'b', long, default_value = "0.0.0.0")]
    bind_address: String,

    /// Local port to listen on (0 picks a free port)
    #[arg(short = 'p', long, default_value_t = 0)]
    port: u16,

    /// Address of a peer to connect to at startup
    #[arg(short = 'a', long)]
    peer_address: Option<String>,

    /// Port of the startup peer
    #[arg(short = 'r', long)]
    peer_port: Option<u16>,
}

impl Cli {
    async fn into_config(self) -> Result<NodeConfig> {
        let bind_addr = SocketAddr::new(resolve_host(&self.bind_address).await?, self.port);
        let bootstrap_peer = match (self.peer_address, self.peer_port) {
            (Some(host), Some(port)) => Some(resolve_addr(&host, port).await?),
            (None, None) => None,
            _ => {
                return Err(Error::config(
                    "--peer-address and --peer-port must be given together",
                ))
            }
        };

        Ok(NodeConfig {
            bind_addr,
            bootstrap_peer,
            ..Default::default()
        })
    }
}

async fn run(cli: Cli) -> Result<()> {
    let node = Node::bind(cli.into_config().await?).await?;
    let handle = node.handle();
    let mut task = tokio::spawn(node.run());

    tokio::select! {
        joined = &mut task => {
            return joined.map_err(|e| Error::invalid_state(format!("node task failed: {}", e)))?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupted, shutting down");
        }
    }

    handle.shutdown().await?;
    task.await
        .map_err(|e| Error::invalid_state(format!("node task failed: {}", e)))?
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
