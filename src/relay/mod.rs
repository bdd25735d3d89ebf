//! Relay core: client registry, broadcast fan-out and the ready gate.
//!
//! # Architecture
//!
//! ```text
//!                    Arc<ClientRegistry<K>>
//!               ┌──────────────────────────────┐
//!               │ identity → Arc<ClientRecord> │
//!               │   display_name  "ClientN"    │
//!               │   send_lock: Mutex<Sink>     │
//!               └──────────────┬───────────────┘
//!                    snapshot()│
//!            ┌─────────────────┴────────────────┐
//!            ▼                                  ▼
//!       Broadcaster                         ReadyGate
//!   "{name}: {message}"              size ≥ threshold, once
//!   join_all(per-client send)        sleep(delay) → "ready"
//!            ▲
//!            │ relay()
//!   handle_stream / handle_datagram  (one task per connection / datagram)
//! ```
//!
//! Writes to one client are serialized by its send lock; writes to
//! different clients proceed in parallel.

pub mod broadcaster;
pub mod gate;
pub mod handler;
pub mod record;
pub mod registry;
pub mod sink;

pub use broadcaster::{format_payload, Broadcaster, DeliveryReport};
pub use gate::ReadyGate;
pub use handler::{handle_datagram, handle_stream, RelayHub};
pub use record::{ClientRecord, Identity};
pub use registry::{ClientRegistry, Registration};
pub use sink::{DatagramSink, PeerSink, StreamSink};
