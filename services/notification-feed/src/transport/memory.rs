//! In-process transport
//!
//! Frames pushed for an account are buffered until that account is
//! subscribed, then delivered in push order. Closes are recorded so callers
//! can observe connection teardown.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use types::ids::AccountId;

use super::{Frame, FrameSource, StreamTransport};
use crate::error::ConnectionError;

#[derive(Default)]
struct MemoryState {
    senders: HashMap<AccountId, mpsc::UnboundedSender<Frame>>,
    pending: HashMap<AccountId, mpsc::UnboundedReceiver<Frame>>,
    subscribed: Vec<AccountId>,
    closed: Vec<AccountId>,
    refused: HashSet<AccountId>,
    failing_close: HashSet<AccountId>,
}

impl MemoryState {
    fn sender(&mut self, account: &AccountId) -> mpsc::UnboundedSender<Frame> {
        if let Some(tx) = self.senders.get(account) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(account.clone(), tx.clone());
        self.pending.insert(account.clone(), rx);
        tx
    }
}

/// Cloneable handle; all clones share one set of streams.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    closes: Arc<Notify>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame on an account's stream.
    pub fn push(&self, account: &AccountId, frame: impl Into<Frame>) {
        let tx = self.state.lock().sender(account);
        // The receiver lives either in `pending` or in a live source.
        let _ = tx.send(frame.into());
    }

    /// End an account's stream as if the server hung up.
    pub fn end_stream(&self, account: &AccountId) {
        let mut state = self.state.lock();
        state.senders.remove(account);
    }

    /// Make future subscriptions for `account` fail.
    pub fn refuse(&self, account: &AccountId) {
        self.state.lock().refused.insert(account.clone());
    }

    /// Make closing `account`'s stream fail.
    pub fn fail_close(&self, account: &AccountId) {
        self.state.lock().failing_close.insert(account.clone());
    }

    /// Accounts in subscription order, including repeats.
    pub fn subscriptions(&self) -> Vec<AccountId> {
        self.state.lock().subscribed.clone()
    }

    /// Accounts whose sources have been closed, in close order.
    pub fn closed(&self) -> Vec<AccountId> {
        self.state.lock().closed.clone()
    }

    /// Wait until `account`'s source has been closed at least once.
    pub async fn wait_for_close(&self, account: &AccountId) {
        loop {
            let notified = self.closes.notified();
            if self.state.lock().closed.contains(account) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl StreamTransport for MemoryTransport {
    async fn subscribe(&self, account: &AccountId) -> Result<Box<dyn FrameSource>, ConnectionError> {
        let mut state = self.state.lock();

        if state.refused.contains(account) {
            return Err(ConnectionError::Connect {
                endpoint: format!("memory://{}", account),
                reason: "refused".to_string(),
            });
        }

        let frames = match state.pending.remove(account) {
            Some(rx) => rx,
            None => {
                // Previous receiver already taken; start a fresh stream.
                let (tx, rx) = mpsc::unbounded_channel();
                state.senders.insert(account.clone(), tx);
                rx
            }
        };
        state.subscribed.push(account.clone());

        Ok(Box::new(MemorySource {
            account: account.clone(),
            frames,
            state: self.state.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct MemorySource {
    account: AccountId,
    frames: mpsc::UnboundedReceiver<Frame>,
    state: Arc<Mutex<MemoryState>>,
    closes: Arc<Notify>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.frames.close();
        let failing = {
            let mut state = self.state.lock();
            state.closed.push(self.account.clone());
            state.failing_close.contains(&self.account)
        };
        self.closes.notify_waiters();

        if failing {
            Err(ConnectionError::Close(format!(
                "simulated close failure for {}",
                self.account
            )))
        } else {
            Ok(())
        }
    }
}
