use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use broadcast_relay::bench::{self, BenchConfig, Transport};
use broadcast_relay::observability::logging;

#[derive(Parser)]
#[command(name = "relay-bench")]
#[command(about = "Load generator that benchmarks a running broadcast relay", long_about = None)]
struct Cli {
    /// TCP relay address.
    #[arg(long, default_value = "127.0.0.1:4001")]
    tcp: SocketAddr,

    /// UDP relay address.
    #[arg(long, default_value = "127.0.0.1:5001")]
    udp: SocketAddr,

    /// Transports to benchmark, in order.
    #[arg(short, long = "transport", value_enum, default_values_t = [Transport::Tcp, Transport::Udp])]
    transports: Vec<Transport>,

    /// Clients per transport.
    #[arg(short, long, default_value_t = 100)]
    clients: usize,

    /// Milliseconds between send rounds.
    #[arg(long, default_value_t = 64)]
    interval_ms: u64,

    /// Seconds to send for, per transport.
    #[arg(short, long, default_value_t = 10)]
    duration_secs: u64,

    /// Seconds to wait between transports.
    #[arg(long, default_value_t = 5)]
    pause_secs: u64,

    /// Log every received payload.
    #[arg(long)]
    log_messages: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let config = BenchConfig {
        clients: cli.clients,
        interval: Duration::from_millis(cli.interval_ms.max(1)),
        duration: Duration::from_secs(cli.duration_secs),
        log_messages: cli.log_messages,
        ..BenchConfig::default()
    };

    let mut results = Vec::with_capacity(cli.transports.len());
    for (i, transport) in cli.transports.iter().copied().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(cli.pause_secs)).await;
        }

        let addr = match transport {
            Transport::Tcp => cli.tcp,
            Transport::Udp => cli.udp,
        };
        println!("Connecting to {} relay at {}", transport.label(), addr);

        let result = bench::run(transport, addr, &config).await;
        println!(
            "{}: {} messages received by {} clients",
            result.name, result.received, result.connected
        );
        results.push(result);
    }

    println!("{}", bench::render(&bench::rank(&results)));
}
