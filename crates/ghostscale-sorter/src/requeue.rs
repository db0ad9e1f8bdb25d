//! Global requeue policy for failed admissions.
//!
//! A failed admission is wrapped in a new request with an incremented
//! attempt counter. Each requeue waits an exponentially growing delay;
//! after `max_attempts` requeues the request is dead-lettered instead.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;

use ghostscale_core::Request;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequeuePolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequeueDecision {
    /// Resubmit after `delay`.
    Retry { delay: Duration },
    /// Give up on the request.
    DeadLetter,
}

impl RequeuePolicy {
    /// Decide what to do with a request that would become requeue number
    /// `attempt` (1-based).
    pub fn decide(&self, attempt: u32) -> RequeueDecision {
        if attempt > self.max_attempts {
            return RequeueDecision::DeadLetter;
        }
        RequeueDecision::Retry {
            delay: self.delay(attempt),
        }
    }

    /// `base * 2^(attempt-1)`, capped at `max_backoff`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// A request the sorter gave up on.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub request: Request,
    pub reason: String,
}

/// Items whose failed admission is waiting out a requeue backoff.
///
/// A remove that arrives in that window finds nothing on the roster, so it
/// leaves a tombstone instead and the requeued admission is dropped when it
/// comes back.
#[derive(Debug, Default)]
pub struct InFlight {
    pending: HashSet<String>,
    tombstones: HashSet<String>,
}

impl InFlight {
    /// Note that an admission of `item_id` has been requeued.
    pub fn track(&mut self, item_id: &str) {
        self.pending.insert(item_id.to_string());
    }

    /// Tombstone `item_id` if an admission of it is pending. Returns true
    /// when a tombstone was recorded.
    pub fn cancel(&mut self, item_id: &str) -> bool {
        if self.pending.contains(item_id) {
            self.tombstones.insert(item_id.to_string());
            true
        } else {
            false
        }
    }

    /// Called when a requeued admission of `item_id` is dequeued. Returns
    /// true if it was cancelled and must be dropped.
    pub fn settle(&mut self, item_id: &str) -> bool {
        self.pending.remove(item_id);
        self.tombstones.remove(item_id)
    }

    pub fn is_pending(&self, item_id: &str) -> bool {
        self.pending.contains(item_id)
    }
}
