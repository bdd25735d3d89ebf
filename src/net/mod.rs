//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (ID, lifetime tracking)
//!     → relay::handler::handle_stream
//!
//! Incoming UDP datagram
//!     → udp.rs (receive loop)
//!     → relay::handler::handle_datagram
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Every connection or datagram runs on its own task
//! - Accept and receive errors never stop the loop

pub mod connection;
pub mod listener;
pub mod udp;

pub use connection::ConnectionId;
pub use listener::TcpRelay;
pub use udp::UdpRelay;
