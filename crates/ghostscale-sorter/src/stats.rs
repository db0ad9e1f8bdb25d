//! Sorter counters and Prometheus text exposition.
//!
//! Counters are plain atomics so producers and the consumer loop can read
//! and bump them without touching the roster lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct SorterStats {
    admitted: AtomicU64,
    removed: AtomicU64,
    provisioned: AtomicU64,
    evicted: AtomicU64,
    relocated: AtomicU64,
    requeued: AtomicU64,
    cancelled: AtomicU64,
    dead_lettered: AtomicU64,
    expander_failures: AtomicU64,
}

/// Point-in-time copy of [`SorterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub removed: u64,
    pub provisioned: u64,
    pub evicted: u64,
    pub relocated: u64,
    pub requeued: u64,
    pub cancelled: u64,
    pub dead_lettered: u64,
    pub expander_failures: u64,
}

impl SorterStats {
    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_provisioned(&self) {
        self.provisioned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_relocated(&self) {
        self.relocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expander_failure(&self) {
        self.expander_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            provisioned: self.provisioned.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            relocated: self.relocated.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            expander_failures: self.expander_failures.load(Ordering::Relaxed),
        }
    }
}

/// Render a snapshot (plus the current queue depth) as Prometheus text.
pub fn render_prometheus(snapshot: &StatsSnapshot, queue_depth: usize) -> String {
    let counters = [
        ("admitted", "Demand units placed on a capacity unit.", snapshot.admitted),
        ("removed", "Demand units removed from the roster.", snapshot.removed),
        ("provisioned", "Capacity units provisioned.", snapshot.provisioned),
        ("evicted", "Placeholders evicted for an ordinary unit.", snapshot.evicted),
        ("relocated", "Evicted placeholders placed on another unit.", snapshot.relocated),
        ("requeued", "Admissions resubmitted after failure.", snapshot.requeued),
        ("cancelled", "Requeued admissions dropped because the item was removed.", snapshot.cancelled),
        ("dead_lettered", "Requests abandoned after too many requeues.", snapshot.dead_lettered),
        ("expander_failures", "Expander calls that failed after retries.", snapshot.expander_failures),
    ];

    let mut out = String::new();
    for (name, help, value) in counters {
        out.push_str(&format!("# HELP ghostscale_sorter_{name}_total {help}\n"));
        out.push_str(&format!("# TYPE ghostscale_sorter_{name}_total counter\n"));
        out.push_str(&format!("ghostscale_sorter_{name}_total {value}\n"));
    }

    out.push_str("# HELP ghostscale_sorter_queue_depth Requests waiting in the queue.\n");
    out.push_str("# TYPE ghostscale_sorter_queue_depth gauge\n");
    out.push_str(&format!("ghostscale_sorter_queue_depth {queue_depth}\n"));
    out
}
