//! Shared helpers for relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use broadcast_relay::config::{ReadyConfig, TcpConfig, UdpConfig};
use broadcast_relay::net::ConnectionId;
use broadcast_relay::{Shutdown, RelayHub, TcpRelay, UdpRelay};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, UdpSocket};

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub fn ready(threshold: usize, delay_ms: u64) -> ReadyConfig {
    ReadyConfig {
        threshold,
        delay_ms,
        ..ReadyConfig::default()
    }
}

/// Start a TCP relay on an ephemeral loopback port.
pub async fn start_tcp_relay(ready: ReadyConfig) -> (SocketAddr, Arc<RelayHub<ConnectionId>>, Shutdown) {
    let config = TcpConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..TcpConfig::default()
    };
    let relay = TcpRelay::bind(&config, &ready).await.unwrap();
    let addr = relay.local_addr().unwrap();
    let hub = Arc::clone(relay.hub());

    let shutdown = Shutdown::new();
    tokio::spawn(relay.run(shutdown.subscribe()));
    (addr, hub, shutdown)
}

/// Start a UDP relay on an ephemeral loopback port.
pub async fn start_udp_relay(ready: ReadyConfig) -> (SocketAddr, Arc<RelayHub<SocketAddr>>, Shutdown) {
    let config = UdpConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..UdpConfig::default()
    };
    let relay = UdpRelay::bind(&config, &ready).await.unwrap();
    let addr = relay.local_addr().unwrap();
    let hub = Arc::clone(relay.hub());

    let shutdown = Shutdown::new();
    tokio::spawn(relay.run(shutdown.subscribe()));
    (addr, hub, shutdown)
}

/// Poll `condition` until it holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + IO_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Read exactly `len` bytes from a stream.
pub async fn read_exact_string(stream: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(IO_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("read timed out")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

/// Read the given payloads from a stream, in any order.
///
/// Stream reads may split or merge writes, so the bytes are read as one
/// block and matched against every ordering.
pub async fn expect_payloads(stream: &mut TcpStream, expected: &[&str]) {
    let total = expected.iter().map(|p| p.len()).sum();
    let received = read_exact_string(stream, total).await;

    let forward: String = expected.concat();
    let backward: String = expected.iter().rev().copied().collect();
    assert!(
        received == forward || (expected.len() == 2 && received == backward),
        "unexpected bytes {:?}, wanted {:?}",
        received,
        expected
    );
}

/// Receive one datagram as a string.
pub async fn recv_datagram(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 2048];
    let n = tokio::time::timeout(IO_TIMEOUT, socket.recv(&mut buf))
        .await
        .expect("receive timed out")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Connect a UDP client socket to the relay.
pub async fn udp_client(relay: SocketAddr) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(relay).await.unwrap();
    socket
}
