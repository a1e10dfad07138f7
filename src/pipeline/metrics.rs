use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide pipeline counters, surfaced through `/v1/stats`.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    accepted: AtomicU64,
    rejected: AtomicU64,
    queue_full: AtomicU64,
    parse_failures: AtomicU64,
    writes_ok: AtomicU64,
    write_failures: AtomicU64,
}

pub type SharedMetrics = Arc<PipelineMetrics>;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub queue_full: u64,
    pub parse_failures: u64,
    pub writes_ok: u64,
    pub write_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> SharedMetrics {
        Arc::new(Self::default())
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Request refused before reaching the queue (bad headers or body).
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_ok(&self) {
        self.writes_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            writes_ok: self.writes_ok.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}
