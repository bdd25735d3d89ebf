//! Load generator against in-process relays.

use std::time::Duration;

use broadcast_relay::bench::{self, BenchConfig, Transport};

mod common;

fn short_run(clients: usize) -> BenchConfig {
    BenchConfig {
        clients,
        interval: Duration::from_millis(10),
        duration: Duration::from_millis(200),
        ..BenchConfig::default()
    }
}

#[tokio::test]
async fn tcp_clients_receive_broadcasts() {
    let (addr, hub, shutdown) = common::start_tcp_relay(common::ready(0, 0)).await;

    let result = bench::run(Transport::Tcp, addr, &short_run(3)).await;

    assert_eq!(result.name, "TCP");
    assert_eq!(result.connected, 3);
    assert_eq!(result.lost, 0);
    assert!(result.received > 0);
    assert!(result.received_bytes >= result.received);

    common::wait_until(|| hub.registry().is_empty()).await;
    shutdown.trigger();
}

#[tokio::test]
async fn udp_clients_receive_broadcasts() {
    let (addr, hub, shutdown) = common::start_udp_relay(common::ready(0, 0)).await;

    let result = bench::run(Transport::Udp, addr, &short_run(2)).await;

    assert_eq!(result.connected, 2);
    assert!(result.received > 0);
    assert_eq!(hub.registry().size(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn unreachable_relay_counts_no_clients() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = bench::run(Transport::Tcp, addr, &short_run(2)).await;

    assert_eq!(result.connected, 0);
    assert_eq!(result.received, 0);
    assert_eq!(bench::rank(&[result])[0].percentage, 0.0);
}
