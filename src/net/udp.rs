//! UDP relay.
//!
//! One socket serves every peer. Each received datagram is handled on its
//! own task; peers are identified by remote address and never expire.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use crate::config::{ReadyConfig, UdpConfig};
use crate::error::{RelayError, Result};
use crate::net::listener::parse_addr;
use crate::relay::handler::{handle_datagram, RelayHub};

/// Datagram-transport relay server.
pub struct UdpRelay {
    socket: Arc<UdpSocket>,
    hub: Arc<RelayHub<SocketAddr>>,
    max_datagram_size: usize,
}

impl UdpRelay {
    pub async fn bind(config: &UdpConfig, ready: &ReadyConfig) -> Result<Self> {
        let addr = parse_addr("udp", &config.bind_address)?;

        let socket = UdpSocket::bind(addr).await.map_err(|source| RelayError::Bind {
            transport: "udp",
            address: config.bind_address.clone(),
            source,
        })?;

        tracing::info!(address = %socket.local_addr()?, "UDP relay listening");

        Ok(Self {
            socket: Arc::new(socket),
            hub: Arc::new(RelayHub::new("udp", ready)),
            max_datagram_size: config.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn hub(&self) -> &Arc<RelayHub<SocketAddr>> {
        &self.hub
    }

    /// Receive datagrams until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut buffer = vec![0u8; self.max_datagram_size];

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("UDP relay stopping");
                    break;
                }
                received = self.socket.recv_from(&mut buffer) => match received {
                    Ok((n, peer)) => {
                        let payload = Bytes::copy_from_slice(&buffer[..n]);
                        let hub = Arc::clone(&self.hub);
                        let socket = Arc::clone(&self.socket);
                        tokio::spawn(handle_datagram(hub, socket, peer, payload));
                    }
                    Err(e) => {
                        // ICMP port-unreachable from a vanished peer surfaces
                        // here on some platforms.
                        tracing::warn!(error = %e, "Failed to receive datagram");
                    }
                },
            }
        }
    }
}
