//! One-shot "ready" signal.
//!
//! The first registration that brings the registry to the configured
//! threshold schedules a delayed broadcast of the sentinel message. The
//! `fired` flag is claimed with a compare-and-swap, so registrations that
//! race past the exact threshold value still fire it exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use super::broadcaster::{Broadcaster, DeliveryReport};
use super::record::Identity;
use crate::config::ReadyConfig;
use crate::observability::metrics;

pub struct ReadyGate<K> {
    /// Zero disables the gate.
    threshold: usize,
    delay: Duration,
    sentinel: Bytes,
    fired: AtomicBool,
    broadcaster: Arc<Broadcaster<K>>,
}

impl<K: Identity> ReadyGate<K> {
    pub fn new(config: &ReadyConfig, broadcaster: Arc<Broadcaster<K>>) -> Self {
        Self {
            threshold: config.threshold,
            delay: config.delay(),
            sentinel: Bytes::from(config.message.clone()),
            fired: AtomicBool::new(false),
            broadcaster,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Clients still needed before the signal fires.
    pub fn remaining(&self, size: usize) -> usize {
        self.threshold.saturating_sub(size)
    }

    /// Called after a new identity was inserted, with the resulting size.
    ///
    /// Returns the handle of the scheduled broadcast if this call fired the
    /// gate. Dropping the handle does not cancel the task.
    pub fn on_registration(&self, size: usize) -> Option<JoinHandle<DeliveryReport>> {
        if self.threshold == 0 || size < self.threshold {
            return None;
        }
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        tracing::info!(
            clients = size,
            delay_ms = self.delay.as_millis() as u64,
            "Threshold reached, scheduling ready signal"
        );

        let broadcaster = Arc::clone(&self.broadcaster);
        let sentinel = self.sentinel.clone();
        let delay = self.delay;

        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let report = broadcaster.deliver_to_all(sentinel, "ready").await;
            metrics::record_ready_signal();
            tracing::info!(
                delivered = report.delivered,
                failed = report.failed,
                "Ready signal sent"
            );
            report
        }))
    }
}
