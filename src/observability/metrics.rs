//! Population counters
//!
//! - Counters only, monotonic
//! - Thread-safe but lock-free
//!
//! Relaxed ordering throughout; counters are never used for synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by a coordinator and all of its populations
#[derive(Debug, Default)]
pub struct PopulationMetrics {
    added: AtomicU64,
    created: AtomicU64,
    create_failures: AtomicU64,
    updates_dispatched: AtomicU64,
    updates_skipped: AtomicU64,
    update_failures: AtomicU64,
    flipped_online: AtomicU64,
    flipped_failed: AtomicU64,
    stopped: AtomicU64,
    dropped: AtomicU64,
    cancelled: AtomicU64,
}

impl PopulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_added(&self) {
        self.added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_create_failures(&self) {
        self.create_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updates_dispatched(&self) {
        self.updates_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Update not applicable to a population's schema
    pub fn increment_updates_skipped(&self) {
        self.updates_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_update_failures(&self) {
        self.update_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_flipped_online(&self) {
        self.flipped_online.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_flipped_failed(&self) {
        self.flipped_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            added: self.added.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            updates_dispatched: self.updates_dispatched.load(Ordering::Relaxed),
            updates_skipped: self.updates_skipped.load(Ordering::Relaxed),
            update_failures: self.update_failures.load(Ordering::Relaxed),
            flipped_online: self.flipped_online.load(Ordering::Relaxed),
            flipped_failed: self.flipped_failed.load(Ordering::Relaxed),
            stopped: self.stopped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub added: u64,
    pub created: u64,
    pub create_failures: u64,
    pub updates_dispatched: u64,
    pub updates_skipped: u64,
    pub update_failures: u64,
    pub flipped_online: u64,
    pub flipped_failed: u64,
    pub stopped: u64,
    pub dropped: u64,
    pub cancelled: u64,
}

impl MetricsSnapshot {
    /// Populations that reached any terminal state
    pub fn terminated(&self) -> u64 {
        self.flipped_online + self.flipped_failed + self.stopped + self.dropped + self.cancelled
    }
}
