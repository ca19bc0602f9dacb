//! Counters for proxy traffic, shared between the client and its workers.

use std::sync::Arc;

use parking_lot::Mutex;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyStatsSnapshot {
    /// Requests submitted.
    pub submitted: u64,
    /// Completions that carried a non-empty answer.
    pub answered: u64,
    /// Completions that resolved to an empty answer without a fault.
    pub silent: u64,
    /// Transport or timeout faults.
    pub failed: u64,
    /// Sum of round-trip latencies, for averaging.
    pub total_latency_ms: u64,
}

impl ProxyStatsSnapshot {
    /// Completions delivered so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.answered + self.silent + self.failed
    }

    /// Mean round-trip latency in milliseconds.
    #[must_use]
    pub fn mean_latency_ms(&self) -> u64 {
        self.total_latency_ms.checked_div(self.completed()).unwrap_or(0)
    }
}

/// Thread-safe proxy counters.
#[derive(Debug, Clone, Default)]
pub struct ProxyStats {
    inner: Arc<Mutex<ProxyStatsSnapshot>>,
}

impl ProxyStats {
    /// Fresh zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submit(&self) {
        self.inner.lock().submitted += 1;
    }

    pub(crate) fn record_outcome(&self, answered: bool, failed: bool, latency_ms: u64) {
        let mut inner = self.inner.lock();
        inner.total_latency_ms += latency_ms;
        if failed {
            inner.failed += 1;
        } else if answered {
            inner.answered += 1;
        } else {
            inner.silent += 1;
        }
    }

    /// Copy the current counters.
    #[must_use]
    pub fn snapshot(&self) -> ProxyStatsSnapshot {
        *self.inner.lock()
    }
}
