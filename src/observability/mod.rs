//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! relay core / listeners
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges; optional Prometheus endpoint)
//! ```

pub mod logging;
pub mod metrics;
