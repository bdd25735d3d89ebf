//! Per-client state held by the registry.

use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use super::sink::PeerSink;

/// Key distinguishing one client from another.
///
/// Stream transports use a per-connection id, datagram transports the
/// remote socket address.
pub trait Identity: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> Identity for T where T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static {}

/// A registered client.
///
/// The sink lives inside the send lock, so at most one write to this client
/// can be in flight at any time.
pub struct ClientRecord<K> {
    identity: K,
    display_name: String,
    order: u64,
    connected: AtomicBool,
    send_lock: Mutex<Box<dyn PeerSink>>,
}

impl<K: Identity> ClientRecord<K> {
    pub(super) fn new(identity: K, display_name: String, order: u64, sink: Box<dyn PeerSink>) -> Self {
        Self {
            identity,
            display_name,
            order,
            connected: AtomicBool::new(true),
            send_lock: Mutex::new(sink),
        }
    }

    pub fn identity(&self) -> &K {
        &self.identity
    }

    /// Name assigned at registration, e.g. `Client3`.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Registration sequence number.
    pub fn order(&self) -> u64 {
        self.order
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Exclude this client from every later broadcast.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Write one payload while holding the send lock.
    ///
    /// The lock is released when the write completes, whatever its outcome.
    pub async fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut sink = self.send_lock.lock().await;
        sink.deliver(payload).await
    }

    /// Close the outbound side, waiting for any in-flight write first.
    pub async fn close(&self) -> io::Result<()> {
        let mut sink = self.send_lock.lock().await;
        sink.close().await
    }
}

impl<K: fmt::Debug> fmt::Debug for ClientRecord<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRecord")
            .field("identity", &self.identity)
            .field("display_name", &self.display_name)
            .field("order", &self.order)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
