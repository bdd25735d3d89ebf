//! Load generator for benchmarking a running relay.
//!
//! For each transport under test, opens `clients` connections (TCP) or
//! connected sockets (UDP), then on every tick each client sends the fixed
//! message set. Every read a client makes counts as one received message;
//! every failed send counts as lost. Runs are ranked by received messages
//! per second against the average of all runs.

use std::fmt::Write as _;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const READ_BUFFER_SIZE: usize = 1024;

/// Messages every client sends on every tick.
pub const DEFAULT_MESSAGES: [&str; 3] = ["Hello World!", "Hello World! 1", "What is the meaning of life?"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub clients: usize,
    pub interval: Duration,
    pub duration: Duration,
    pub messages: Vec<String>,
    /// Log every received payload at info level.
    pub log_messages: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            clients: 100,
            interval: Duration::from_millis(64),
            duration: Duration::from_secs(10),
            messages: DEFAULT_MESSAGES.iter().map(|m| m.to_string()).collect(),
            log_messages: false,
        }
    }
}

/// Raw counts from one transport run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub name: String,
    pub connected: usize,
    pub received: u64,
    pub received_bytes: u64,
    pub lost: u64,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.received as f64 / secs
        } else {
            0.0
        }
    }
}

/// A run placed against the average of all runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub name: String,
    pub per_second: f64,
    pub lost: u64,
    /// Difference from the mean rate, in percent.
    pub percentage: f64,
}

/// One inbound read.
struct Received {
    bytes: usize,
}

enum Client {
    Tcp(OwnedWriteHalf),
    Udp(Arc<UdpSocket>),
}

impl Client {
    async fn send(&mut self, message: &[u8]) -> io::Result<()> {
        match self {
            Client::Tcp(writer) => writer.write_all(message).await,
            Client::Udp(socket) => socket.send(message).await.map(|_| ()),
        }
    }
}

/// Drive one transport at `addr` and count what comes back.
///
/// Clients that fail to connect are logged and skipped.
pub async fn run(transport: Transport, addr: SocketAddr, config: &BenchConfig) -> RunResult {
    let (received_tx, mut received_rx) = mpsc::unbounded_channel::<Received>();

    let counter = tokio::spawn(async move {
        let mut messages = 0u64;
        let mut bytes = 0u64;
        while let Some(received) = received_rx.recv().await {
            messages += 1;
            bytes += received.bytes as u64;
        }
        (messages, bytes)
    });

    let mut clients = Vec::with_capacity(config.clients);
    let mut readers = Vec::with_capacity(config.clients);
    for index in 0..config.clients {
        let connected = match transport {
            Transport::Tcp => connect_tcp(addr, received_tx.clone(), config.log_messages).await,
            Transport::Udp => connect_udp(addr, received_tx.clone(), config.log_messages).await,
        };
        match connected {
            Ok((client, reader)) => {
                clients.push(client);
                readers.push(reader);
            }
            Err(e) => {
                tracing::warn!(transport = transport.label(), client = index, error = %e, "Failed to connect");
            }
        }
    }
    drop(received_tx);

    tracing::info!(transport = transport.label(), connected = clients.len(), "Sending");
    let start = tokio::time::Instant::now();
    let lost = send_until(&mut clients, &config.messages, config.interval, config.duration).await;
    let elapsed = start.elapsed();

    let connected = clients.len();
    drop(clients);
    for reader in &readers {
        reader.abort();
    }
    let (received, received_bytes) = counter.await.unwrap_or_default();

    RunResult {
        name: transport.label().to_string(),
        connected,
        received,
        received_bytes,
        lost,
        elapsed,
    }
}

/// Send the message set from every client on each tick until `duration`
/// elapses. Returns the number of failed sends.
async fn send_until(clients: &mut [Client], messages: &[String], interval: Duration, duration: Duration) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    let mut lost = 0u64;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                for client in clients.iter_mut() {
                    for message in messages {
                        if client.send(message.as_bytes()).await.is_err() {
                            lost += 1;
                        }
                    }
                }
            }
        }
    }
    lost
}

async fn connect_tcp(
    addr: SocketAddr,
    received: mpsc::UnboundedSender<Received>,
    log_messages: bool,
) -> io::Result<(Client, JoinHandle<()>)> {
    let stream = TcpStream::connect(addr).await?;
    let (mut reader, writer) = stream.into_split();

    let task = tokio::spawn(async move {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if !count(&received, &buffer[..n], "TCP", log_messages) {
                        break;
                    }
                }
            }
        }
    });

    Ok((Client::Tcp(writer), task))
}

async fn connect_udp(
    addr: SocketAddr,
    received: mpsc::UnboundedSender<Received>,
    log_messages: bool,
) -> io::Result<(Client, JoinHandle<()>)> {
    let local: SocketAddr = if addr.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    let socket = Arc::new(socket);

    let reader = Arc::clone(&socket);
    let task = tokio::spawn(async move {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.recv(&mut buffer).await {
                Ok(n) => {
                    if !count(&received, &buffer[..n], "UDP", log_messages) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    Ok((Client::Udp(socket), task))
}

/// Returns false once the counter has gone away.
fn count(received: &mpsc::UnboundedSender<Received>, payload: &[u8], transport: &'static str, log: bool) -> bool {
    if log {
        tracing::info!(transport, payload = %String::from_utf8_lossy(payload), "Received");
    }
    received.send(Received { bytes: payload.len() }).is_ok()
}

/// Rank runs by rate, fastest first.
pub fn rank(results: &[RunResult]) -> Vec<Ranked> {
    if results.is_empty() {
        return Vec::new();
    }

    let mean = results.iter().map(RunResult::per_second).sum::<f64>() / results.len() as f64;

    let mut ranked: Vec<Ranked> = results
        .iter()
        .map(|result| {
            let per_second = result.per_second();
            Ranked {
                name: result.name.clone(),
                per_second,
                lost: result.lost,
                percentage: if mean > 0.0 {
                    (per_second - mean) / mean * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.per_second.total_cmp(&a.per_second));
    ranked
}

pub fn render(ranked: &[Ranked]) -> String {
    let mut out = String::new();
    for entry in ranked {
        let _ = write!(
            out,
            "Relay: {}\nAvg Messages/sec: {:.2}\nLost Packets: {}\nPercentage Difference: {:.2}%\n\n",
            entry.name, entry.per_second, entry.lost, entry.percentage
        );
    }
    out
}
