//! Counters and snapshots for the chat service

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic event counter
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Service-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Sessions currently registered
    pub active_sessions: u64,
    /// Live groups across all buckets
    pub active_groups: u64,
    /// Buckets with at least one group
    pub active_buckets: u64,
    /// Messages published since start
    pub messages_published: u64,
    /// Messages purged by the expiry sweep
    pub messages_expired: u64,
    /// Messages skipped by subscribers that fell behind
    pub messages_dropped: u64,
    /// Sessions removed for missing heartbeats
    pub sessions_timed_out: u64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average members per group
    pub fn average_group_size(&self) -> f64 {
        if self.active_groups > 0 {
            self.active_sessions as f64 / self.active_groups as f64
        } else {
            0.0
        }
    }
}
