use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters for one flow
#[derive(Debug, Default)]
pub struct FlowStats {
    received: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    validation_failed: AtomicU64,
}

/// Point-in-time copy of `FlowStats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStatsSnapshot {
    pub flow: String,
    pub received: u64,
    pub published: u64,
    /// All failures, validation failures included
    pub failed: u64,
    pub validation_failed: u64,
    /// Received but not yet published or failed
    pub in_flight: u64,
}

impl FlowStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, validation: bool) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if validation {
            self.validation_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events received but not yet finished
    pub fn in_flight(&self) -> u64 {
        let done = self.published.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        self.received.load(Ordering::Relaxed).saturating_sub(done)
    }

    pub fn snapshot(&self, flow: &str) -> FlowStatsSnapshot {
        FlowStatsSnapshot {
            flow: flow.to_string(),
            received: self.received.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            validation_failed: self.validation_failed.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}
