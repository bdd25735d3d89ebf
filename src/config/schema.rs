//! Configuration schema definitions.
//!
//! All sections default field-by-field, so a config file only needs the
//! values it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Stream transport.
    pub tcp: TcpConfig,

    /// Datagram transport.
    pub udp: UdpConfig,

    /// Threshold-gated ready signal.
    pub ready: ReadyConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// TCP relay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpConfig {
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:4001").
    pub bind_address: String,

    /// Bytes requested per read. Each read is relayed as one message.
    pub read_buffer_size: usize,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Disable Nagle's algorithm on accepted sockets.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:4001".to_string(),
            read_buffer_size: 1024,
            max_connections: 10_000,
            nodelay: true,
        }
    }
}

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// UDP relay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UdpConfig {
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:5001").
    pub bind_address: String,

    /// Receive buffer size; longer datagrams are truncated by the OS.
    pub max_datagram_size: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:5001".to_string(),
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }
}

/// Ready signal settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadyConfig {
    /// Registrations needed before the signal fires (0 = never).
    pub threshold: usize,

    /// Delay between reaching the threshold and sending, in milliseconds.
    pub delay_ms: u64,

    /// Sentinel payload, sent without a name prefix.
    pub message: String,
}

impl ReadyConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for ReadyConfig {
    fn default() -> Self {
        Self {
            threshold: 100,
            delay_ms: 100,
            message: "ready".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
