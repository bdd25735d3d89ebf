//! Fan-out of one payload to every connected client.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::join_all;

use super::record::Identity;
use super::registry::ClientRegistry;
use crate::observability::metrics;

/// Tally of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients still connected when the snapshot was taken.
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Build the wire payload `"{sender}: {message}"`.
///
/// Inbound bytes are decoded as UTF-8; invalid sequences are replaced with
/// U+FFFD.
pub fn format_payload(sender: &str, message: &[u8]) -> Bytes {
    Bytes::from(format!("{}: {}", sender, String::from_utf8_lossy(message)))
}

/// Sends payloads to a snapshot of the registry.
pub struct Broadcaster<K> {
    registry: Arc<ClientRegistry<K>>,
}

impl<K: Identity> Broadcaster<K> {
    pub fn new(registry: Arc<ClientRegistry<K>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry<K>> {
        &self.registry
    }

    /// Relay `message` from `sender` to every member, the sender included.
    pub async fn broadcast(&self, sender: &str, message: &[u8]) -> DeliveryReport {
        self.deliver_to_all(format_payload(sender, message), "message").await
    }

    /// Send `payload` to every connected member of a fresh snapshot.
    ///
    /// Sends run concurrently and each takes its recipient's send lock.
    /// Returns once every send has completed or failed; a failed send is
    /// logged and counted, never propagated.
    pub async fn deliver_to_all(&self, payload: Bytes, kind: &'static str) -> DeliveryReport {
        let recipients: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|record| record.is_connected())
            .collect();

        let sends = recipients.iter().map(|record| {
            let payload = &payload;
            async move {
                match record.send(payload).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            client = %record.display_name(),
                            identity = ?record.identity(),
                            kind,
                            error = %e,
                            "Failed to deliver payload"
                        );
                        false
                    }
                }
            }
        });

        let outcomes = join_all(sends).await;
        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = DeliveryReport {
            attempted: outcomes.len(),
            delivered,
            failed: outcomes.len() - delivered,
        };

        metrics::record_deliveries(report.delivered, report.failed);
        tracing::trace!(kind, ?report, "Fan-out complete");
        report
    }
}
