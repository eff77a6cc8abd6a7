//! Feed counters
//!
//! Lock-free counters for what the feed has done since start: accepted
//! events, dropped duplicates, decode failures and connection churn.
//! Repeated decode failures are only visible here and through the error
//! reporter, never in the notification log itself.

use std::sync::atomic::{AtomicU64, Ordering};

/// Core counters for the notification feed.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    // Ingestion
    pub events_accepted: AtomicU64,
    pub duplicates_dropped: AtomicU64,
    pub decode_failures: AtomicU64,

    // Connections
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
    pub close_failures: AtomicU64,
    pub active_connections: AtomicU64,
}

/// Point-in-time copy of `FeedMetrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub events_accepted: u64,
    pub duplicates_dropped: u64,
    pub decode_failures: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub close_failures: u64,
    pub active_connections: u64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_dropped(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close_failure(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the number of live connections.
    pub fn set_active_connections(&self, count: u64) {
        self.active_connections.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
        }
    }
}
