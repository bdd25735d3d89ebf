//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every problem is
//! reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::{RelayConfig, MAX_DATAGRAM_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not exceed {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("udp.max_datagram_size {0} exceeds the 65507 byte limit")]
    DatagramTooLarge(usize),

    #[error("at least one of tcp or udp must be enabled")]
    NoTransport,

    #[error("ready.message must not be empty")]
    EmptySentinel,
}

/// Check a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.tcp.enabled && !config.udp.enabled {
        errors.push(ValidationError::NoTransport);
    }

    if config.tcp.enabled {
        check_address(&mut errors, "tcp.bind_address", &config.tcp.bind_address);
        if config.tcp.read_buffer_size == 0 {
            errors.push(ValidationError::Zero { field: "tcp.read_buffer_size" });
        }
        if config.tcp.max_connections == 0 {
            errors.push(ValidationError::Zero { field: "tcp.max_connections" });
        } else if config.tcp.max_connections > Semaphore::MAX_PERMITS {
            errors.push(ValidationError::TooLarge {
                field: "tcp.max_connections",
                max: Semaphore::MAX_PERMITS,
            });
        }
    }

    if config.udp.enabled {
        check_address(&mut errors, "udp.bind_address", &config.udp.bind_address);
        if config.udp.max_datagram_size == 0 {
            errors.push(ValidationError::Zero { field: "udp.max_datagram_size" });
        } else if config.udp.max_datagram_size > MAX_DATAGRAM_SIZE {
            errors.push(ValidationError::DatagramTooLarge(config.udp.max_datagram_size));
        }
    }

    if config.ready.message.is_empty() {
        errors.push(ValidationError::EmptySentinel);
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
