// CLI entry point for the LAN lobby server.
//
// Loads an optional JSON config file, applies command-line overrides, and
// runs the server until the process is killed. Logging goes to stdout via
// `tracing-subscriber`; set `RUST_LOG` to change the level (default `info`).
// See `server.rs` for the networking architecture and `lobby.rs` for the
// lobby rules.
//
// Usage:
//   lobby-server [OPTIONS]
//     --config <FILE>              JSON config file
//     --bind <IP>                  Listen address (default: 0.0.0.0)
//     --port <PORT>                Session port (default: 5555)
//     --transport <KIND>           Session transport (only TCP is supported)
//     --max-players <N>            Lobby capacity (default: 4)
//     --discovery-port <PORT>      Broadcast port (default: 37020)
//     --broadcast-interval-ms <MS> Broadcast cadence (default: 1000)
//     --advertise-ip <IP>          IP put in announcements
//     --no-discovery               Don't broadcast lobbies

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use lanlobby_server::{ServerConfig, ServerError, start_server};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "lobby-server", about = "LAN lobby discovery and session server")]
struct Args {
    /// JSON config file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address the session listener binds to
    #[arg(long)]
    bind: Option<String>,

    /// Session listener port
    #[arg(short, long)]
    port: Option<u16>,

    /// Session transport (only TCP is supported)
    #[arg(long)]
    transport: Option<String>,

    /// Roster entries allowed per lobby
    #[arg(long)]
    max_players: Option<u32>,

    /// UDP port lobby announcements are broadcast to
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Milliseconds between announcements
    #[arg(long)]
    broadcast_interval_ms: Option<u64>,

    /// IP to advertise instead of the detected LAN address
    #[arg(long)]
    advertise_ip: Option<IpAddr>,

    /// Disable discovery broadcasting
    #[arg(long)]
    no_discovery: bool,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, ServerError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(max_players) = self.max_players {
            config.max_players = max_players;
        }
        if let Some(port) = self.discovery_port {
            config.discovery.port = port;
        }
        if let Some(interval) = self.broadcast_interval_ms {
            config.discovery.interval_ms = interval;
        }
        if self.advertise_ip.is_some() {
            config.discovery.advertise_ip = self.advertise_ip;
        }
        if self.no_discovery {
            config.discovery.enabled = false;
        }
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let handle = match Args::parse().into_config().and_then(start_server) {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to start lobby server: {e}");
            std::process::exit(1);
        }
    };

    info!(addr = %handle.local_addr(), "press Ctrl+C to stop");
    handle.wait();
}
