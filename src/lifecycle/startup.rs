//! Startup orchestration.
//!
//! Binds every enabled relay before any of them starts serving, so a bad
//! address fails the whole process instead of leaving one transport up.

use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{TcpRelay, UdpRelay};

/// Running relay tasks.
pub struct Relays {
    pub handles: Vec<JoinHandle<()>>,
}

impl Relays {
    /// Wait for every relay loop to stop.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Relay task failed");
            }
        }
    }
}

/// Bind and spawn the relays enabled in `config`.
pub async fn start(config: &RelayConfig, shutdown: &Shutdown) -> Result<Relays> {
    let tcp = if config.tcp.enabled {
        Some(TcpRelay::bind(&config.tcp, &config.ready).await?)
    } else {
        None
    };
    let udp = if config.udp.enabled {
        Some(UdpRelay::bind(&config.udp, &config.ready).await?)
    } else {
        None
    };

    let mut handles = Vec::new();
    if let Some(relay) = tcp {
        handles.push(tokio::spawn(relay.run(shutdown.subscribe())));
    }
    if let Some(relay) = udp {
        handles.push(tokio::spawn(relay.run(shutdown.subscribe())));
    }

    tracing::info!(
        relays = handles.len(),
        threshold = config.ready.threshold,
        "Relays started"
    );
    Ok(Relays { handles })
}
