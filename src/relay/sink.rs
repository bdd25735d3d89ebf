//! Outbound transport abstraction.
//!
//! A [`PeerSink`] is the only way the relay core writes to a client. Stream
//! transports wrap their write half in a [`StreamSink`]; datagram transports
//! share one socket and address each peer through a [`DatagramSink`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;

/// Delivers payloads to a single client.
///
/// One call to [`deliver`](PeerSink::deliver) is one payload unit on the wire.
/// Implementations are always driven through the owning record's send lock,
/// so they never see two concurrent calls.
#[async_trait]
pub trait PeerSink: Send + 'static {
    async fn deliver(&mut self, payload: &[u8]) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink over any async byte stream (TCP write half, in-memory duplex).
pub struct StreamSink<W> {
    writer: W,
}

impl<W> StreamSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> PeerSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn deliver(&mut self, payload: &[u8]) -> io::Result<()> {
        self.writer.write_all(payload).await?;
        self.writer.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

/// Sink addressing one remote peer through a shared datagram socket.
pub struct DatagramSink {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl DatagramSink {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait]
impl PeerSink for DatagramSink {
    async fn deliver(&mut self, payload: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(payload, self.peer).await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {} of {} bytes", sent, payload.len()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sinks for unit tests.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Shared view of every byte a [`RecordingSink`] received.
    #[derive(Clone, Default)]
    pub struct Inbox {
        bytes: Arc<Mutex<Vec<u8>>>,
        payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Inbox {
        pub fn bytes(&self) -> Vec<u8> {
            self.bytes.lock().unwrap().clone()
        }

        pub fn payloads(&self) -> Vec<String> {
            self.payloads
                .lock()
                .unwrap()
                .iter()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .collect()
        }
    }

    /// Records payloads, optionally writing them one byte at a time with a
    /// yield between bytes so that unserialized writers would interleave.
    pub struct RecordingSink {
        inbox: Inbox,
        trickle: bool,
        delay: Option<Duration>,
    }

    impl RecordingSink {
        pub fn new() -> (Self, Inbox) {
            let inbox = Inbox::default();
            (
                Self {
                    inbox: inbox.clone(),
                    trickle: false,
                    delay: None,
                },
                inbox,
            )
        }

        pub fn trickling() -> (Self, Inbox) {
            let (mut sink, inbox) = Self::new();
            sink.trickle = true;
            (sink, inbox)
        }

        pub fn slow(delay: Duration) -> (Self, Inbox) {
            let (mut sink, inbox) = Self::new();
            sink.delay = Some(delay);
            (sink, inbox)
        }
    }

    #[async_trait]
    impl PeerSink for RecordingSink {
        async fn deliver(&mut self, payload: &[u8]) -> io::Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.trickle {
                for byte in payload {
                    self.inbox.bytes.lock().unwrap().push(*byte);
                    tokio::task::yield_now().await;
                }
            } else {
                self.inbox.bytes.lock().unwrap().extend_from_slice(payload);
            }
            self.inbox.payloads.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    /// Fails every delivery.
    pub struct BrokenSink;

    #[async_trait]
    impl PeerSink for BrokenSink {
        async fn deliver(&mut self, _payload: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        }
    }
}
