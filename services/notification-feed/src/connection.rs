//! Stream connections
//!
//! A `StreamConnection` owns one account's subscription. Two tasks back it:
//!
//! ```text
//! FrameSource ──► reader ──► bounded queue ──► worker ──► NotificationStore
//!                                                 │
//!                                                 └──► ErrorReporter (decode failures)
//! ```
//!
//! The reader applies backpressure to the transport when the queue is full.
//! The worker decodes and ingests under a delivery gate; `close()` shuts the
//! gate, so once it returns no further ingestion comes from this connection.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::ids::AccountId;

use crate::error::FeedError;
use crate::events::DecoderRegistry;
use crate::metrics::FeedMetrics;
use crate::reporter::ErrorReporter;
use crate::store::{IngestOutcome, NotificationStore};
use crate::transport::{Frame, FrameSource, StreamTransport};

/// Everything a connection needs to deliver into the store.
#[derive(Clone)]
pub struct IngestContext {
    pub store: Arc<NotificationStore>,
    pub decoders: Arc<DecoderRegistry>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub metrics: Arc<FeedMetrics>,
    /// Capacity of the per-connection frame queue.
    pub queue_capacity: usize,
}

/// Live subscription to a single account.
pub struct StreamConnection {
    account: AccountId,
    /// `true` while deliveries are allowed.
    gate: Arc<Mutex<bool>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    worker: JoinHandle<()>,
}

impl StreamConnection {
    /// Open a connection and start delivering into the store.
    ///
    /// Must be called from within a Tokio runtime. Stream establishment is
    /// asynchronous; this returns immediately.
    pub fn open(account: AccountId, transport: Arc<dyn StreamTransport>, ctx: IngestContext) -> Self {
        let capacity = ctx.queue_capacity.max(1);
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let gate = Arc::new(Mutex::new(true));

        tokio::spawn(read_frames(
            account.clone(),
            transport,
            frames_tx,
            shutdown_rx,
            ctx.clone(),
        ));
        let worker = tokio::spawn(deliver_frames(
            account.clone(),
            frames_rx,
            gate.clone(),
            ctx,
        ));

        info!(account = %account, queue_capacity = capacity, "Stream connection opened");

        Self {
            account,
            gate,
            shutdown: Mutex::new(Some(shutdown_tx)),
            worker,
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn is_closed(&self) -> bool {
        !*self.gate.lock()
    }

    /// Stop delivery and release the transport.
    ///
    /// Idempotent and infallible. A delivery already in progress finishes
    /// before this returns; nothing is ingested afterwards. Transport close
    /// failures are logged by the reader task and never surface here.
    pub fn close(&self) {
        {
            let mut open = self.gate.lock();
            if !*open {
                return;
            }
            *open = false;
        }

        if let Some(shutdown) = self.shutdown.lock().take() {
            // Reader may already have exited on end-of-stream.
            let _ = shutdown.send(());
        }
        self.worker.abort();

        info!(account = %self.account, "Stream connection closed");
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("account", &self.account)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn read_frames(
    account: AccountId,
    transport: Arc<dyn StreamTransport>,
    frames: mpsc::Sender<Frame>,
    mut shutdown: oneshot::Receiver<()>,
    ctx: IngestContext,
) {
    let mut source = tokio::select! {
        subscribed = transport.subscribe(&account) => match subscribed {
            Ok(source) => source,
            Err(e) => {
                warn!(account = %account, error = %e, "Subscription failed, no events from this account");
                ctx.reporter.report(&account, &FeedError::from(e));
                return;
            }
        },
        _ = &mut shutdown => {
            debug!(account = %account, "Closed before subscription completed");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                close_source(&account, source.as_mut(), &ctx).await;
                return;
            }
            next = source.next_frame() => match next {
                Some(Ok(frame)) => {
                    tokio::select! {
                        sent = frames.send(frame) => {
                            if sent.is_err() {
                                // Worker gone; connection is closing.
                                close_source(&account, source.as_mut(), &ctx).await;
                                return;
                            }
                        }
                        _ = &mut shutdown => {
                            close_source(&account, source.as_mut(), &ctx).await;
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(account = %account, error = %e, "Transport error, stream ended");
                    close_source(&account, source.as_mut(), &ctx).await;
                    return;
                }
                None => {
                    debug!(account = %account, "Stream ended by transport");
                    return;
                }
            }
        }
    }
}

async fn close_source(account: &AccountId, source: &mut dyn FrameSource, ctx: &IngestContext) {
    if let Err(e) = source.close().await {
        ctx.metrics.record_close_failure();
        warn!(account = %account, error = %e, "Failed to close stream");
    }
}

async fn deliver_frames(
    account: AccountId,
    mut frames: mpsc::Receiver<Frame>,
    gate: Arc<Mutex<bool>>,
    ctx: IngestContext,
) {
    while let Some(frame) = frames.recv().await {
        let decoded = ctx.decoders.decode(&frame);

        let open = gate.lock();
        if !*open {
            break;
        }
        match decoded {
            Ok(event) => match ctx.store.ingest(event) {
                IngestOutcome::Accepted { sequence } => {
                    debug!(account = %account, sequence, "Delivered event");
                }
                IngestOutcome::Duplicate => {
                    debug!(account = %account, "Delivered duplicate");
                }
            },
            Err(e) => {
                ctx.metrics.record_decode_failure();
                warn!(account = %account, error = %e, "Dropping undecodable frame");
                ctx.reporter.report(&account, &FeedError::from(e));
            }
        }
        drop(open);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::DecodeError;
    use crate::events::CONFIRMATION_BLOCK_NOTIFICATION;
    use crate::reporter::RecordingReporter;
    use crate::transport::MemoryTransport;
    use serde_json::json;
    use std::time::Duration;

    fn make_ctx(reporter: Arc<RecordingReporter>) -> IngestContext {
        let metrics = Arc::new(FeedMetrics::new());
        IngestContext {
            store: Arc::new(NotificationStore::new(Arc::new(SystemClock), metrics.clone())),
            decoders: Arc::new(DecoderRegistry::default()),
            reporter,
            metrics,
            queue_capacity: 4,
        }
    }

    fn confirmation_frame(block_identifier: &str) -> String {
        json!({
            "notification_type": CONFIRMATION_BLOCK_NOTIFICATION,
            "payload": {"message": {
                "block_identifier": block_identifier,
                "block": {"account_number": "sender", "message": {"txs": []}}
            }}
        })
        .to_string()
    }

    async fn wait_for_len(store: &NotificationStore, len: usize) {
        let mut changes = store.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.len() < len {
                changes.changed().await.unwrap();
            }
        })
        .await
        .expect("timed out waiting for ingestion");
    }

    #[tokio::test]
    async fn test_frames_delivered_in_order() {
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = make_ctx(reporter.clone());
        let store = ctx.store.clone();
        let transport = MemoryTransport::new();
        let account = AccountId::new("a");

        for i in 0..10 {
            transport.push(&account, confirmation_frame(&format!("b{}", i)));
        }
        let connection = StreamConnection::open(account.clone(), Arc::new(transport.clone()), ctx);

        wait_for_len(&store, 10).await;
        let keys: Vec<String> = store
            .snapshot()
            .entries
            .into_iter()
            .filter_map(|e| e.dedupe_key)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("b{}", i)).collect();
        assert_eq!(keys, expected);
        assert!(reporter.is_empty());

        connection.close();
    }

    #[tokio::test]
    async fn test_malformed_frame_reported_and_skipped() {
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = make_ctx(reporter.clone());
        let store = ctx.store.clone();
        let metrics = ctx.metrics.clone();
        let transport = MemoryTransport::new();
        let account = AccountId::new("a");

        transport.push(&account, confirmation_frame("b1"));
        transport.push(&account, "{garbage");
        transport.push(&account, confirmation_frame("b2"));
        let connection = StreamConnection::open(account.clone(), Arc::new(transport.clone()), ctx);

        wait_for_len(&store, 2).await;
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, account);
        assert!(matches!(reports[0].1, FeedError::Decode(_)));
        assert_eq!(metrics.snapshot().decode_failures, 1);

        connection.close();
    }

    #[tokio::test]
    async fn test_invalid_utf8_binary_frame_reported() {
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = make_ctx(reporter.clone());
        let store = ctx.store.clone();
        let metrics = ctx.metrics.clone();
        let transport = MemoryTransport::new();
        let account = AccountId::new("a");

        let mut invalid = confirmation_frame("blk#").into_bytes();
        let at = invalid.iter().position(|b| *b == b'#').unwrap();
        invalid[at] = 0xff;

        transport.push(&account, invalid);
        transport.push(&account, confirmation_frame("b1").into_bytes());
        let connection = StreamConnection::open(account.clone(), Arc::new(transport.clone()), ctx);

        wait_for_len(&store, 1).await;
        assert_eq!(
            store.snapshot().entries[0].dedupe_key.as_deref(),
            Some("b1")
        );
        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            reports[0].1,
            FeedError::Decode(DecodeError::InvalidUtf8(_))
        ));
        assert_eq!(metrics.snapshot().decode_failures, 1);

        connection.close();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_delivery() {
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = make_ctx(reporter.clone());
        let store = ctx.store.clone();
        let transport = MemoryTransport::new();
        let account = AccountId::new("a");

        transport.push(&account, confirmation_frame("b1"));
        let connection = StreamConnection::open(account.clone(), Arc::new(transport.clone()), ctx);
        wait_for_len(&store, 1).await;

        connection.close();
        connection.close();
        assert!(connection.is_closed());

        transport.wait_for_close(&account).await;
        transport.push(&account, confirmation_frame("b2"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(transport.closed(), vec![account]);
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = make_ctx(reporter.clone());
        let metrics = ctx.metrics.clone();
        let transport = MemoryTransport::new();
        let account = AccountId::new("a");
        transport.fail_close(&account);

        let connection = StreamConnection::open(account.clone(), Arc::new(transport.clone()), ctx);
        // Let the reader subscribe before closing.
        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.subscriptions().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        connection.close();
        transport.wait_for_close(&account).await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.snapshot().close_failures == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(reporter.is_empty());
    }

    #[tokio::test]
    async fn test_refused_subscription_reported() {
        let reporter = Arc::new(RecordingReporter::new());
        let ctx = make_ctx(reporter.clone());
        let transport = MemoryTransport::new();
        let account = AccountId::new("a");
        transport.refuse(&account);

        let connection = StreamConnection::open(account.clone(), Arc::new(transport), ctx);
        tokio::time::timeout(Duration::from_secs(5), async {
            while reporter.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0].1, FeedError::Connection(_)));
        connection.close();
    }
}
