//! Error reporter port
//!
//! Sink for decode and connection failures. Each failure is reported
//! exactly once by the connection that hit it.

use parking_lot::Mutex;
use tracing::error;
use types::ids::AccountId;

use crate::error::FeedError;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, account: &AccountId, error: &FeedError);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, account: &AccountId, error: &FeedError) {
        error!(account = %account, error = %error, "Notification processing failed");
    }
}

/// Keeps every report in memory, for tests and embedding UIs that show
/// their own error list.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(AccountId, FeedError)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(AccountId, FeedError)> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, account: &AccountId, error: &FeedError) {
        self.reports.lock().push((account.clone(), error.clone()));
    }
}
