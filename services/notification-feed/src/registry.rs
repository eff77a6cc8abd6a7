//! Stream registry
//!
//! Keeps exactly one `StreamConnection` per tracked account. `reconcile`
//! diffs the tracked set against the live connections, closing the ones no
//! longer tracked and opening the new ones.
//!
//! Uses BTreeMap so reconcile outcomes and account listings are ordered.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;
use types::ids::AccountId;

use crate::connection::{IngestContext, StreamConnection};
use crate::transport::StreamTransport;

/// Accounts touched by one `reconcile` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub opened: Vec<AccountId>,
    pub closed: Vec<AccountId>,
}

impl ReconcileOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

pub struct StreamRegistry {
    transport: Arc<dyn StreamTransport>,
    ctx: IngestContext,
    connections: BTreeMap<AccountId, StreamConnection>,
}

impl StreamRegistry {
    pub fn new(transport: Arc<dyn StreamTransport>, ctx: IngestContext) -> Self {
        Self {
            transport,
            ctx,
            connections: BTreeMap::new(),
        }
    }

    /// Bring the connection set in line with `tracked`.
    ///
    /// Closes before opening. Closing never fails from the caller's point
    /// of view, so one bad connection cannot keep others from changing.
    pub fn reconcile(&mut self, tracked: &BTreeSet<AccountId>) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let stale: Vec<AccountId> = self
            .connections
            .keys()
            .filter(|account| !tracked.contains(*account))
            .cloned()
            .collect();

        for account in stale {
            if let Some(connection) = self.connections.remove(&account) {
                connection.close();
                self.ctx.metrics.record_connection_closed();
                outcome.closed.push(account);
            }
        }

        for account in tracked {
            if self.connections.contains_key(account) {
                continue;
            }
            let connection =
                StreamConnection::open(account.clone(), self.transport.clone(), self.ctx.clone());
            self.connections.insert(account.clone(), connection);
            self.ctx.metrics.record_connection_opened();
            outcome.opened.push(account.clone());
        }

        self.ctx
            .metrics
            .set_active_connections(self.connections.len() as u64);

        if !outcome.is_unchanged() {
            info!(
                opened = outcome.opened.len(),
                closed = outcome.closed.len(),
                active = self.connections.len(),
                "Reconciled stream connections"
            );
        }

        outcome
    }

    /// Close every connection.
    pub fn close_all(&mut self) -> Vec<AccountId> {
        self.reconcile(&BTreeSet::new()).closed
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.connections.contains_key(account)
    }

    pub fn connection(&self, account: &AccountId) -> Option<&StreamConnection> {
        self.connections.get(account)
    }

    /// Accounts with a live connection, in order.
    pub fn accounts(&self) -> Vec<AccountId> {
        self.connections.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}
