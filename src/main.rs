//! Broadcast relay server.
//!
//! ```text
//!   client ──tcp──▶ TcpRelay ─┐                      ┌──▶ every tcp client
//!                             ├─▶ RelayHub (per transport) ─┤
//!   client ──udp──▶ UdpRelay ─┘   registry · broadcaster ·   └──▶ every udp peer
//!                                 ready gate
//! ```

use std::path::PathBuf;

use clap::Parser;

use broadcast_relay::config::{self, RelayConfig};
use broadcast_relay::lifecycle::{signals, startup, Shutdown};
use broadcast_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "broadcast-relay")]
#[command(about = "Relays every client's messages to every connected client", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,

    /// Clients to wait for before sending the ready signal.
    #[arg(short, long)]
    threshold: Option<usize>,

    /// TCP bind address.
    #[arg(long)]
    tcp_bind: Option<String>,

    /// UDP bind address.
    #[arg(long)]
    udp_bind: Option<String>,

    /// Do not start the TCP relay.
    #[arg(long)]
    no_tcp: bool,

    /// Do not start the UDP relay.
    #[arg(long)]
    no_udp: bool,
}

impl Cli {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(threshold) = self.threshold {
            config.ready.threshold = threshold;
        }
        if let Some(addr) = &self.tcp_bind {
            config.tcp.bind_address = addr.clone();
        }
        if let Some(addr) = &self.udp_bind {
            config.udp.bind_address = addr.clone();
        }
        if self.no_tcp {
            config.tcp.enabled = false;
        }
        if self.no_udp {
            config.udp.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);
    if let Err(errors) = config::validate_config(&config) {
        return Err(config::ConfigError::Validation(errors).into());
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("broadcast-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let relays = startup::start(&config, &shutdown).await?;

    signals::wait_for_signal().await;
    shutdown.trigger();
    relays.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
