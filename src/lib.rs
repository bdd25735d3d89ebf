//! Connection-oriented broadcast relay.
//!
//! Clients connect over TCP or UDP and send text; every message is relayed,
//! prefixed with the sender's `ClientN` name, to every known client. Once a
//! configured number of clients has registered, all of them receive a
//! one-shot `ready` message.

pub mod bench;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use lifecycle::Shutdown;
pub use net::{TcpRelay, UdpRelay};
pub use relay::{Broadcaster, ClientRegistry, ReadyGate, RelayHub};
