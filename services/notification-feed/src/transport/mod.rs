//! Transport layer
//!
//! A transport hands out one frame source per account. Connection
//! establishment, reconnects and backoff live behind this seam; the feed
//! only sees data frames and end-of-stream.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;
use types::ids::AccountId;

use crate::error::ConnectionError;

pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;

/// A data frame as it came off the wire.
///
/// Binary frames keep their raw bytes; UTF-8 validation happens at decode
/// time so a bad frame is reported like any other undecodable frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Frame::Binary(bytes)
    }
}

/// One live subscription to a single account's event source.
#[async_trait]
pub trait FrameSource: Send {
    /// Next data frame. `None` means the stream has ended.
    ///
    /// Must be cancel-safe: dropping the returned future must not lose a
    /// frame.
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>>;

    /// Release the underlying transport resource.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Opens frame sources for accounts.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn subscribe(&self, account: &AccountId) -> Result<Box<dyn FrameSource>, ConnectionError>;
}
