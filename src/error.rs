//! Crate-level error type.
//!
//! Only startup can fail as a whole. Errors inside a running relay (one
//! read, one send, one accept) are logged where they happen and never
//! surface here.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to bind {transport} listener on {address}: {source}")]
    Bind {
        transport: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
