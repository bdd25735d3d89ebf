//! Per-connection and per-datagram handling.
//!
//! # Stream lifecycle
//! ```text
//! UNREGISTERED ──admit──▶ REGISTERED ──read loop──▶ CLOSED
//!                             │  each non-empty read is one message
//!                             └─ zero-length read or read error ends the loop
//! ```
//! Datagram sources have no lifecycle: every datagram is admitted (a no-op
//! for known addresses) and relayed, and entries are never removed.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UdpSocket;

use super::broadcaster::{Broadcaster, DeliveryReport};
use super::gate::ReadyGate;
use super::record::{ClientRecord, Identity};
use super::registry::{ClientRegistry, Registration};
use super::sink::{DatagramSink, PeerSink, StreamSink};
use crate::config::ReadyConfig;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Registry, broadcaster and ready gate for one transport.
pub struct RelayHub<K> {
    transport: &'static str,
    registry: Arc<ClientRegistry<K>>,
    broadcaster: Arc<Broadcaster<K>>,
    gate: ReadyGate<K>,
}

impl<K: Identity> RelayHub<K> {
    pub fn new(transport: &'static str, ready: &ReadyConfig) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));
        let gate = ReadyGate::new(ready, Arc::clone(&broadcaster));
        Self {
            transport,
            registry,
            broadcaster,
            gate,
        }
    }

    pub fn transport(&self) -> &'static str {
        self.transport
    }

    pub fn registry(&self) -> &Arc<ClientRegistry<K>> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster<K>> {
        &self.broadcaster
    }

    pub fn gate(&self) -> &ReadyGate<K> {
        &self.gate
    }

    /// Register `identity` if unseen and notify the ready gate.
    pub fn admit<F>(&self, identity: K, make_sink: F) -> Registration<K>
    where
        F: FnOnce() -> Box<dyn PeerSink>,
    {
        let registration = self.registry.register(identity, make_sink);

        if registration.is_new {
            tracing::info!(
                transport = self.transport,
                client = %registration.display_name(),
                identity = ?registration.record.identity(),
                remaining = self.gate.remaining(registration.size),
                "{} connected ({} remain)",
                registration.display_name(),
                self.gate.remaining(registration.size)
            );
            metrics::record_registration(self.transport, registration.size);
            // Fire-and-forget: the ready broadcast is never awaited here.
            drop(self.gate.on_registration(registration.size));
        }

        registration
    }

    /// Broadcast one inbound message from `sender`.
    pub async fn relay(&self, sender: &ClientRecord<K>, message: &[u8]) -> DeliveryReport {
        metrics::record_message(self.transport, message.len());
        tracing::debug!(
            transport = self.transport,
            client = %sender.display_name(),
            bytes = message.len(),
            "Relaying message"
        );
        self.broadcaster.broadcast(sender.display_name(), message).await
    }

    /// Remove a closed client and close its outbound side.
    pub async fn release(&self, record: &ClientRecord<K>) {
        record.mark_disconnected();
        self.registry.deregister(record.identity());
        metrics::record_departure(self.transport, self.registry.size());

        if let Err(e) = record.close().await {
            tracing::debug!(client = %record.display_name(), error = %e, "Error closing client");
        }
        tracing::info!(
            transport = self.transport,
            client = %record.display_name(),
            "{} disconnected",
            record.display_name()
        );
    }
}

/// Drive one stream connection until it closes.
///
/// Each successful non-empty read, up to `buffer_size` bytes, is relayed as
/// one message; no framing is applied.
pub async fn handle_stream<R, W>(
    hub: Arc<RelayHub<ConnectionId>>,
    id: ConnectionId,
    mut reader: R,
    writer: W,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let record = hub.admit(id, || Box::new(StreamSink::new(writer))).record;

    let mut buffer = vec![0u8; buffer_size];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                tracing::debug!(connection_id = %id, "Peer closed connection");
                break;
            }
            Ok(n) => {
                hub.relay(&record, &buffer[..n]).await;
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, client = %record.display_name(), error = %e, "Read error");
                break;
            }
        }
    }

    hub.release(&record).await;
}

/// Handle one inbound datagram: register the source if new, then relay.
pub async fn handle_datagram(
    hub: Arc<RelayHub<SocketAddr>>,
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    payload: Bytes,
) -> DeliveryReport {
    let registration = hub.admit(peer, || Box::new(DatagramSink::new(Arc::clone(&socket), peer)));
    hub.relay(&registration.record, &payload).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::relay::sink::testing::RecordingSink;

    fn ready(threshold: usize) -> ReadyConfig {
        ReadyConfig {
            threshold,
            delay_ms: 10,
            ..ReadyConfig::default()
        }
    }

    #[tokio::test]
    async fn admit_is_idempotent_per_identity() {
        let hub = RelayHub::new("test", &ready(0));

        let first = hub.admit("a", || Box::new(RecordingSink::new().0));
        let again = hub.admit("a", || Box::new(RecordingSink::new().0));

        assert!(first.is_new);
        assert!(!again.is_new);
        assert_eq!(hub.registry().size(), 1);
    }

    #[tokio::test]
    async fn stream_connection_relays_then_deregisters() {
        let hub = Arc::new(RelayHub::new("tcp", &ready(0)));
        let (observer, observer_inbox) = RecordingSink::new();
        hub.admit(ConnectionId::new(), || Box::new(observer));

        let (mut client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let id = ConnectionId::new();
        let task = tokio::spawn(handle_stream(Arc::clone(&hub), id, reader, writer, 1024));

        client.write_all(b"hi").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hub.registry().size(), 2);

        drop(client);
        task.await.unwrap();

        assert_eq!(observer_inbox.payloads(), vec!["Client2: hi"]);
        assert!(hub.registry().get(&id).is_none());
        assert_eq!(hub.registry().size(), 1);
    }

    #[tokio::test]
    async fn long_write_is_relayed_one_read_at_a_time() {
        let hub = Arc::new(RelayHub::new("tcp", &ready(0)));
        let (observer, observer_inbox) = RecordingSink::new();
        hub.admit(ConnectionId::new(), || Box::new(observer));

        let (mut client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let task = tokio::spawn(handle_stream(Arc::clone(&hub), ConnectionId::new(), reader, writer, 4));

        client.write_all(b"abcdefghij").await.unwrap();
        drop(client);
        task.await.unwrap();

        assert_eq!(
            observer_inbox.payloads(),
            vec!["Client2: abcd", "Client2: efgh", "Client2: ij"]
        );
    }

    #[tokio::test]
    async fn stream_sender_receives_own_message() {
        let hub = Arc::new(RelayHub::new("tcp", &ready(0)));
        let (mut client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let task = tokio::spawn(handle_stream(Arc::clone(&hub), ConnectionId::new(), reader, writer, 1024));

        client.write_all(b"echo").await.unwrap();
        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Client1: echo");

        client.shutdown().await.unwrap();
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn datagram_sources_are_never_removed() {
        let hub = Arc::new(RelayHub::new("udp", &ready(0)));
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();

        let report = handle_datagram(Arc::clone(&hub), Arc::clone(&socket), peer_addr, Bytes::from_static(b"one")).await;
        assert_eq!(report.delivered, 1);
        handle_datagram(Arc::clone(&hub), Arc::clone(&socket), peer_addr, Bytes::from_static(b"two")).await;

        assert_eq!(hub.registry().size(), 1);
        let mut buf = [0u8; 64];
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Client1: one");
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Client1: two");
    }
}
