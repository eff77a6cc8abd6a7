//! Notification Feed
//!
//! Subscribes to one push-notification stream per tracked account and
//! merges everything into a single deduplicated feed with a read
//! watermark:
//! - One stream connection per tracked account, reconciled on change
//! - Decoding of JSON-framed events into typed payloads
//! - Dedup of repeat deliveries (same kind, same block identifier)
//! - Newest-first ordering independent of arrival order
//! - Unread indicator and bell/menu state machine
//!
//! # Architecture
//!
//! ```text
//! AccountBook ── tracked set ──► StreamRegistry
//!                                     │ one per account
//!                              ┌──────▼──────┐
//!                              │  Connection │ reader ─► bounded queue ─► worker
//!                              └─────────────┘                               │
//!                                                  ┌─── decode failures ─────┤
//!                                                  ▼                         ▼ ingest
//!                                            ErrorReporter          NotificationStore
//!                                                                            │
//!                                                           ┌────────────────┴──┐
//!                                                           ▼                   ▼
//!                                                     ViewProjector     NotificationBell
//! ```

pub mod bell;
pub mod clock;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod events;
pub mod feed;
pub mod metrics;
pub mod projector;
pub mod registry;
pub mod reporter;
pub mod store;
pub mod transport;

pub use feed::NotificationFeed;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
