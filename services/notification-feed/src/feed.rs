//! Notification feed facade
//!
//! Wires the store, registry, projector and bell together and exposes the
//! surface the presentation layer consumes.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use types::ids::AccountId;

use crate::bell::{MenuState, NotificationBell};
use crate::clock::{Clock, SystemClock};
use crate::config::FeedConfig;
use crate::connection::IngestContext;
use crate::events::DecoderRegistry;
use crate::metrics::{FeedMetrics, MetricsSnapshot};
use crate::projector::{ConfirmationRow, ViewProjector};
use crate::registry::{ReconcileOutcome, StreamRegistry};
use crate::reporter::ErrorReporter;
use crate::store::{LogEntry, NotificationStore};
use crate::transport::StreamTransport;

pub struct NotificationFeed {
    store: Arc<NotificationStore>,
    registry: StreamRegistry,
    projector: ViewProjector,
    bell: NotificationBell,
    metrics: Arc<FeedMetrics>,
    display_kind: String,
}

impl NotificationFeed {
    pub fn new(
        config: &FeedConfig,
        transport: Arc<dyn StreamTransport>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self::with_parts(
            config,
            transport,
            reporter,
            Arc::new(SystemClock),
            DecoderRegistry::default(),
        )
    }

    pub fn with_parts(
        config: &FeedConfig,
        transport: Arc<dyn StreamTransport>,
        reporter: Arc<dyn ErrorReporter>,
        clock: Arc<dyn Clock>,
        decoders: DecoderRegistry,
    ) -> Self {
        let metrics = Arc::new(FeedMetrics::new());
        let store = Arc::new(NotificationStore::new(clock, metrics.clone()));
        let ctx = IngestContext {
            store: store.clone(),
            decoders: Arc::new(decoders),
            reporter,
            metrics: metrics.clone(),
            queue_capacity: config.queue_capacity,
        };

        Self {
            registry: StreamRegistry::new(transport, ctx),
            projector: ViewProjector::new(store.clone()),
            bell: NotificationBell::new(store.clone()),
            store,
            metrics,
            display_kind: config.display_kind.clone(),
        }
    }

    /// Open and close streams so they match `tracked`.
    pub fn reconcile(&mut self, tracked: &BTreeSet<AccountId>) -> ReconcileOutcome {
        self.registry.reconcile(tracked)
    }

    /// Entries of `kind`, newest first.
    pub fn ordered_entries(&self, kind: &str) -> Vec<LogEntry> {
        self.projector.ordered_entries(kind)
    }

    /// Entries of the configured display kind, newest first.
    pub fn display_entries(&self) -> Vec<LogEntry> {
        self.projector.ordered_entries(&self.display_kind)
    }

    pub fn confirmation_rows(&self) -> Vec<ConfirmationRow> {
        self.projector.confirmation_rows()
    }

    pub fn has_unread(&self) -> bool {
        self.projector.has_unread()
    }

    /// Current bell state after applying arrivals.
    pub fn menu_state(&mut self) -> MenuState {
        self.bell.sync()
    }

    pub fn on_bell_click(&mut self) -> MenuState {
        self.bell.on_bell_click()
    }

    pub fn on_menu_close(&mut self) -> MenuState {
        self.bell.on_menu_close()
    }

    pub fn on_navigated_away(&mut self) -> MenuState {
        self.bell.on_navigated_away()
    }

    /// Revision counter that changes whenever the view may have changed.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn projector(&self) -> &ViewProjector {
        &self.projector
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Close every stream. The log and watermark are kept.
    pub fn shutdown(&mut self) -> Vec<AccountId> {
        self.registry.close_all()
    }
}
