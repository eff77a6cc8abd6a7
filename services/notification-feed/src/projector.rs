//! Presentation projections
//!
//! Pure derivations of store state for display: the ordered entry list for
//! a kind, the unread indicator, and one row per confirmed transfer. Cheap
//! enough to recompute on every render tick; nothing is cached.

use std::sync::Arc;

use types::ids::AccountId;
use types::time::UnixMillis;
use uuid::Uuid;

use crate::store::{display_order, LogEntry, NotificationStore, StoreSnapshot};

/// One displayable transfer from a confirmed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRow {
    pub entry_id: Uuid,
    /// Index of the transfer within its block
    pub position: usize,
    pub received_at: UnixMillis,
    pub sender: AccountId,
    pub recipient: AccountId,
    pub amount: u64,
    pub read: bool,
}

/// Entries of `kind`, newest first, ties in arrival order.
pub fn ordered_entries(entries: &[LogEntry], kind: &str) -> Vec<LogEntry> {
    let mut selected: Vec<LogEntry> = entries
        .iter()
        .filter(|entry| entry.kind == kind)
        .cloned()
        .collect();
    selected.sort_by(display_order);
    selected
}

/// True iff some entry arrived after the watermark.
pub fn has_unread(entries: &[LogEntry], last_read_time: UnixMillis) -> bool {
    entries.iter().any(|entry| entry.is_unread(last_read_time))
}

/// Number of entries that arrived after the watermark.
pub fn unread_count(entries: &[LogEntry], last_read_time: UnixMillis) -> usize {
    entries
        .iter()
        .filter(|entry| entry.is_unread(last_read_time))
        .count()
}

/// Flatten confirmation blocks into transfer rows, newest block first.
pub fn confirmation_rows(entries: &[LogEntry], last_read_time: UnixMillis) -> Vec<ConfirmationRow> {
    let mut blocks: Vec<&LogEntry> = entries
        .iter()
        .filter(|entry| entry.payload.as_confirmation_block().is_some())
        .collect();
    blocks.sort_by(|a, b| display_order(a, b));

    blocks
        .into_iter()
        .filter_map(|entry| {
            entry
                .payload
                .as_confirmation_block()
                .map(|block| (entry, block))
        })
        .flat_map(|(entry, block)| {
            block
                .txs
                .iter()
                .enumerate()
                .map(move |(position, tx)| ConfirmationRow {
                    entry_id: entry.entry_id,
                    position,
                    received_at: entry.received_at,
                    sender: block.sender.clone(),
                    recipient: tx.recipient.clone(),
                    amount: tx.amount,
                    read: !entry.is_unread(last_read_time),
                })
        })
        .collect()
}

/// Read-only view over a shared store.
#[derive(Clone)]
pub struct ViewProjector {
    store: Arc<NotificationStore>,
}

impl ViewProjector {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }

    pub fn ordered_entries(&self, kind: &str) -> Vec<LogEntry> {
        let snapshot = self.store.snapshot();
        ordered_entries(&snapshot.entries, kind)
    }

    pub fn has_unread(&self) -> bool {
        self.store.has_unread()
    }

    pub fn unread_count(&self) -> usize {
        let StoreSnapshot {
            entries,
            last_read_time,
        } = self.store.snapshot();
        unread_count(&entries, last_read_time)
    }

    pub fn confirmation_rows(&self) -> Vec<ConfirmationRow> {
        let snapshot = self.store.snapshot();
        confirmation_rows(&snapshot.entries, snapshot.last_read_time)
    }
}
