//! Notification store
//!
//! Merges decoded events from every account stream into one log, drops
//! repeat deliveries, and holds the read watermark.
//!
//! Invariants:
//! - No two entries share the same kind and non-null dedupe key
//! - Entries are stamped with a strictly increasing insertion sequence
//! - `last_read_time` never moves backwards
//!
//! The log is kept in arrival order. Display order (newest first, ties by
//! insertion) is imposed at read time, so concurrent producers never need
//! to coordinate with each other.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info};
use types::time::UnixMillis;
use uuid::Uuid;

use crate::clock::Clock;
use crate::events::{NotificationPayload, RawEvent};
use crate::metrics::FeedMetrics;

/// An accepted notification. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Unique entry identifier (UUID v7)
    pub entry_id: Uuid,
    /// Insertion sequence, strictly increasing across the whole store
    pub sequence: u64,
    /// Arrival time in Unix milliseconds
    pub received_at: UnixMillis,
    pub kind: String,
    pub payload: NotificationPayload,
    pub dedupe_key: Option<String>,
}

impl LogEntry {
    /// Whether the entry is newer than the given watermark.
    pub fn is_unread(&self, last_read_time: UnixMillis) -> bool {
        self.received_at > last_read_time
    }
}

/// Display ordering: `received_at` descending, earlier insertion first on ties.
pub fn display_order(a: &LogEntry, b: &LogEntry) -> std::cmp::Ordering {
    b.received_at
        .cmp(&a.received_at)
        .then_with(|| a.sequence.cmp(&b.sequence))
}

/// Result of ingesting a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event appended to the log.
    Accepted { sequence: u64 },
    /// An entry with the same kind and dedupe key already exists.
    Duplicate,
}

/// Read-only copy of the store state.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    /// Entries in arrival order.
    pub entries: Vec<LogEntry>,
    pub last_read_time: UnixMillis,
}

struct StoreState {
    log: Vec<LogEntry>,
    seen: HashSet<(String, String)>,
    last_read_time: UnixMillis,
    next_sequence: u64,
}

/// Thread-safe aggregation core shared by all stream connections.
pub struct NotificationStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
    metrics: Arc<FeedMetrics>,
    revision: watch::Sender<u64>,
}

impl NotificationStore {
    /// Create a store whose watermark starts at the clock's current time.
    pub fn new(clock: Arc<dyn Clock>, metrics: Arc<FeedMetrics>) -> Self {
        let last_read_time = clock.now_millis();
        let (revision, _) = watch::channel(0);

        info!(last_read_time, "NotificationStore initialized");

        Self {
            state: RwLock::new(StoreState {
                log: Vec::new(),
                seen: HashSet::new(),
                last_read_time,
                next_sequence: 0,
            }),
            clock,
            metrics,
            revision,
        }
    }

    /// Ingest a decoded event.
    ///
    /// Safe to call concurrently from any number of connections. The dedup
    /// check and the insert happen under one write lock, so when two streams
    /// deliver the same block the first insert wins and the second is
    /// dropped.
    pub fn ingest(&self, event: RawEvent) -> IngestOutcome {
        let dedupe_key = event.dedupe_key();

        let sequence = {
            let mut state = self.state.write();

            if let Some(key) = &dedupe_key {
                if !state.seen.insert((event.kind.clone(), key.clone())) {
                    drop(state);
                    self.metrics.record_duplicate_dropped();
                    debug!(kind = %event.kind, dedupe_key = %key, "Dropping duplicate event");
                    return IngestOutcome::Duplicate;
                }
            }

            let sequence = state.next_sequence;
            state.next_sequence += 1;

            let entry = LogEntry {
                entry_id: Uuid::now_v7(),
                sequence,
                received_at: self.clock.now_millis(),
                kind: event.kind,
                payload: event.payload,
                dedupe_key,
            };

            debug!(
                sequence,
                kind = %entry.kind,
                received_at = entry.received_at,
                log_size = state.log.len() + 1,
                "Event accepted"
            );

            state.log.push(entry);
            sequence
        };

        self.metrics.record_event_accepted();
        self.bump_revision();
        IngestOutcome::Accepted { sequence }
    }

    /// Advance the read watermark to now.
    ///
    /// Never moves the watermark backwards; returns the watermark in effect
    /// afterwards.
    pub fn mark_read(&self) -> UnixMillis {
        let now = self.clock.now_millis();
        let moved = {
            let mut state = self.state.write();
            if now > state.last_read_time {
                state.last_read_time = now;
                true
            } else {
                false
            }
        };

        if moved {
            debug!(last_read_time = now, "Watermark advanced");
            self.bump_revision();
            now
        } else {
            self.last_read_time()
        }
    }

    /// All entries, newest first.
    pub fn current_log(&self) -> Vec<LogEntry> {
        let mut entries = self.state.read().log.clone();
        entries.sort_by(display_order);
        entries
    }

    /// Entries in arrival order plus the watermark, read atomically.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            entries: state.log.clone(),
            last_read_time: state.last_read_time,
        }
    }

    pub fn last_read_time(&self) -> UnixMillis {
        self.state.read().last_read_time
    }

    /// Whether any entry is newer than the watermark.
    pub fn has_unread(&self) -> bool {
        let state = self.state.read();
        state
            .log
            .iter()
            .any(|entry| entry.is_unread(state.last_read_time))
    }

    /// Whether an entry inserted at or after `sequence` is newer than the
    /// watermark.
    pub fn has_unread_since(&self, sequence: u64) -> bool {
        let state = self.state.read();
        // Sequences are dense and start at 0, so the index is the sequence.
        let start = usize::try_from(sequence).unwrap_or(usize::MAX);
        state
            .log
            .iter()
            .skip(start)
            .any(|entry| entry.is_unread(state.last_read_time))
    }

    /// Sequence the next accepted entry will receive.
    pub fn next_sequence(&self) -> u64 {
        self.state.read().next_sequence
    }

    pub fn len(&self) -> usize {
        self.state.read().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().log.is_empty()
    }

    /// Watch the store revision, bumped on every accepted entry and every
    /// watermark move.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
