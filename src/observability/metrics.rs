//! Relay metrics.
//!
//! # Metrics
//! - `relay_clients_registered_total` (counter): new clients by transport
//! - `relay_clients_active` (gauge): current registry size by transport
//! - `relay_connections_active` (gauge): open stream connections by transport
//! - `relay_messages_total` (counter): inbound messages relayed by transport
//! - `relay_inbound_bytes_total` (counter): inbound message bytes by transport
//! - `relay_deliveries_total` (counter): per-recipient sends by outcome
//! - `relay_ready_signals_total` (counter): sentinel broadcasts fired
//!
//! Without an installed recorder every call is a no-op, so the relay core
//! records unconditionally.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_registration(transport: &'static str, active: usize) {
    metrics::counter!("relay_clients_registered_total", "transport" => transport).increment(1);
    metrics::gauge!("relay_clients_active", "transport" => transport).set(active as f64);
}

pub fn record_departure(transport: &'static str, active: usize) {
    metrics::gauge!("relay_clients_active", "transport" => transport).set(active as f64);
}

pub fn record_connections(transport: &'static str, active: u64) {
    metrics::gauge!("relay_connections_active", "transport" => transport).set(active as f64);
}

pub fn record_message(transport: &'static str, bytes: usize) {
    metrics::counter!("relay_messages_total", "transport" => transport).increment(1);
    metrics::counter!("relay_inbound_bytes_total", "transport" => transport).increment(bytes as u64);
}

pub fn record_deliveries(delivered: usize, failed: usize) {
    metrics::counter!("relay_deliveries_total", "outcome" => "delivered").increment(delivered as u64);
    if failed > 0 {
        metrics::counter!("relay_deliveries_total", "outcome" => "failed").increment(failed as u64);
    }
}

pub fn record_ready_signal() {
    metrics::counter!("relay_ready_signals_total").increment(1);
}
