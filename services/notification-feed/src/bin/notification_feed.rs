use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use notification_feed::config::FeedConfig;
use notification_feed::directory::{AccountBook, AccountRecord};
use notification_feed::reporter::TracingReporter;
use notification_feed::transport::WebSocketTransport;
use notification_feed::NotificationFeed;
use tracing_subscriber::EnvFilter;
use types::ids::AccountId;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = FeedConfig::from_env()?;

    let mut book = AccountBook::new();
    for arg in std::env::args().skip(1) {
        if let Some(account) = AccountId::try_new(arg) {
            book.add_managed(AccountRecord::new(account));
        }
    }
    let tracked: BTreeSet<AccountId> = book.tracked_accounts();
    if tracked.is_empty() {
        anyhow::bail!("usage: notification-feed <account_number>...");
    }

    tracing::info!(
        accounts = tracked.len(),
        endpoint = %config.endpoint_template,
        "Starting notification feed"
    );

    let transport = Arc::new(WebSocketTransport::new(config.endpoint_template.clone()));
    let mut feed = NotificationFeed::new(&config, transport, Arc::new(TracingReporter));
    feed.reconcile(&tracked);

    let mut changes = feed.changes();
    let mut shown = HashSet::new();
    let mut unread = false;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }

                for row in feed.confirmation_rows().into_iter().rev() {
                    if shown.insert((row.entry_id, row.position)) {
                        tracing::info!(
                            from = %book.display_name(&row.sender),
                            to = %book.display_name(&row.recipient),
                            amount = row.amount,
                            "{} paid you +{}",
                            book.display_name(&row.sender),
                            row.amount
                        );
                    }
                }

                let now_unread = feed.has_unread();
                if now_unread != unread {
                    unread = now_unread;
                    tracing::info!(unread, "Unread indicator changed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    let closed = feed.shutdown();
    let metrics = feed.metrics();
    tracing::info!(
        closed = closed.len(),
        accepted = metrics.events_accepted,
        duplicates = metrics.duplicates_dropped,
        decode_failures = metrics.decode_failures,
        "Notification feed stopped"
    );

    Ok(())
}
