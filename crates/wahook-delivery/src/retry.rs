//! Fixed-delay retry scheduling.
//!
//! Failed envelopes are not re-queued immediately: each one waits a
//! constant delay and then re-enters the main queue at the tail. Pending
//! retries live in a min-heap keyed by fire-at time, owned by the worker
//! and drained once per tick, so a downstream outage costs one heap entry
//! per in-flight envelope rather than one timer task each, and shutdown
//! can cancel every pending delay deterministically.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    time::{Duration, Instant},
};

use wahook_core::QueuedEnvelope;

/// Retry policy for failed deliveries.
///
/// The delay is constant by design: webhook consumers are expected to be
/// idempotent and order-tolerant, so backoff shaping buys nothing here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which an envelope is dead-lettered.
    pub max_retries: u32,
    /// Delay before a failed envelope re-enters the main queue.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(crate::DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// A retry waiting for its fire-at time.
#[derive(Debug)]
struct PendingRetry {
    due_at: Instant,
    envelope: QueuedEnvelope,
}

impl PartialEq for PendingRetry {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at
    }
}

impl Eq for PendingRetry {}

impl Ord for PendingRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want earliest-due first.
        other.due_at.cmp(&self.due_at)
    }
}

impl PartialOrd for PendingRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending retries keyed by fire-at time.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    pending: BinaryHeap<PendingRetry>,
}

impl RetryScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an envelope to re-enter the queue at `due_at`.
    pub fn schedule(&mut self, envelope: QueuedEnvelope, due_at: Instant) {
        self.pending.push(PendingRetry { due_at, envelope });
    }

    /// Removes and returns every envelope whose fire-at time has passed,
    /// earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<QueuedEnvelope> {
        let mut due = Vec::new();
        while let Some(next) = self.pending.peek() {
            if next.due_at > now {
                break;
            }
            let retry = self.pending.pop().expect("peeked entry exists");
            due.push(retry.envelope);
        }
        due
    }

    /// Removes and returns every pending envelope regardless of fire-at
    /// time, earliest first. Used at shutdown to flush pending retries
    /// back to the durable queue.
    pub fn drain_all(&mut self) -> Vec<QueuedEnvelope> {
        let mut all = Vec::with_capacity(self.pending.len());
        while let Some(retry) = self.pending.pop() {
            all.push(retry.envelope);
        }
        all
    }

    /// Number of retries currently waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no retries are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
