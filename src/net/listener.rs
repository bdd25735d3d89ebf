//! TCP relay listener with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Hand each connection to the stream handler on its own task
//! - Log accept errors and keep accepting, backing off while they persist

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};

use crate::config::{ReadyConfig, TcpConfig};
use crate::error::{RelayError, Result};
use crate::net::connection::{ConnectionId, ConnectionTracker};
use crate::observability::metrics;
use crate::relay::handler::{handle_stream, RelayHub};

/// First pause after a failed accept.
const ACCEPT_BACKOFF_BASE_MS: u64 = 10;
/// Longest pause between failed accepts.
const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;

/// Stream-transport relay server.
pub struct TcpRelay {
    inner: TcpListener,
    hub: Arc<RelayHub<ConnectionId>>,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
    config: TcpConfig,
}

impl TcpRelay {
    /// Bind to the configured address.
    pub async fn bind(config: &TcpConfig, ready: &ReadyConfig) -> Result<Self> {
        let addr = parse_addr("tcp", &config.bind_address)?;

        let listener = TcpListener::bind(addr).await.map_err(|source| RelayError::Bind {
            transport: "tcp",
            address: config.bind_address.clone(),
            source,
        })?;

        tracing::info!(
            address = %listener.local_addr()?,
            max_connections = config.max_connections,
            "TCP relay listening"
        );

        Ok(Self {
            inner: listener,
            hub: Arc::new(RelayHub::new("tcp", ready)),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            tracker: ConnectionTracker::new(),
            config: config.clone(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn hub(&self) -> &Arc<RelayHub<ConnectionId>> {
        &self.hub
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("TCP relay stopping");
                    break;
                }
                accepted = self.accept() => match accepted {
                    Some((stream, peer_addr, permit)) => self.spawn_connection(stream, peer_addr, permit),
                    None => break,
                },
            }
        }
    }

    /// Wait for a connection slot, then accept.
    ///
    /// Accept errors are logged and retried after a growing pause, so a
    /// persistent failure such as descriptor exhaustion does not spin.
    /// Returns `None` only if the connection semaphore was closed.
    async fn accept(&self) -> Option<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.connection_limit).acquire_owned().await.ok()?;
        let mut failures = 0u32;

        loop {
            match self.inner.accept().await {
                Ok((stream, peer_addr)) => {
                    tracing::debug!(
                        peer_addr = %peer_addr,
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );
                    return Some((stream, peer_addr, permit));
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    tracing::error!(
                        error = %e,
                        failures,
                        retry_in_ms = pause.as_millis() as u64,
                        "Failed to accept connection"
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer_addr: SocketAddr, permit: OwnedSemaphorePermit) {
        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::warn!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let guard = self.tracker.track();
        let id = guard.id();
        let tracker = self.tracker.clone();
        let hub = Arc::clone(&self.hub);
        let buffer_size = self.config.read_buffer_size;

        let active = tracker.active_count();
        metrics::record_connections("tcp", active);
        tracing::debug!(connection_id = %id, peer_addr = %peer_addr, active_connections = active, "Connection opened");

        tokio::spawn(async move {
            let _permit = permit;

            let (reader, writer) = stream.into_split();
            handle_stream(hub, id, reader, writer, buffer_size).await;

            drop(guard);
            let active = tracker.active_count();
            metrics::record_connections("tcp", active);
            tracing::debug!(connection_id = %id, active_connections = active, "Connection closed");
        });
    }
}

pub(crate) fn parse_addr(transport: &'static str, value: &str) -> Result<SocketAddr> {
    value.parse().map_err(|e| RelayError::Bind {
        transport,
        address: value.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })
}

/// Pause before retrying after the `failures`th consecutive accept error.
///
/// Doubles from [`ACCEPT_BACKOFF_BASE_MS`] up to [`ACCEPT_BACKOFF_MAX_MS`].
fn accept_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(failures - 1);
    Duration::from_millis(ACCEPT_BACKOFF_BASE_MS.saturating_mul(factor).min(ACCEPT_BACKOFF_MAX_MS))
}
