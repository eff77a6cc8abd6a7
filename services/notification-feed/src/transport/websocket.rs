//! WebSocket transport
//!
//! One WebSocket per account at `endpoint_template` with `{account}`
//! replaced by the account number.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use types::ids::AccountId;

use super::{Frame, FrameSource, StreamTransport};
use crate::error::ConnectionError;

/// Placeholder replaced with the account number.
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    endpoint_template: String,
}

impl WebSocketTransport {
    pub fn new(endpoint_template: impl Into<String>) -> Self {
        Self {
            endpoint_template: endpoint_template.into(),
        }
    }

    pub fn endpoint_for(&self, account: &AccountId) -> String {
        self.endpoint_template
            .replace(ACCOUNT_PLACEHOLDER, account.as_str())
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn subscribe(&self, account: &AccountId) -> Result<Box<dyn FrameSource>, ConnectionError> {
        let endpoint = self.endpoint_for(account);
        let (socket, _response) =
            connect_async(endpoint.as_str())
                .await
                .map_err(|e| ConnectionError::Connect {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;

        info!(account = %account, endpoint = %endpoint, "WebSocket connected");
        Ok(Box::new(WebSocketSource { socket }))
    }
}

struct WebSocketSource {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectionError>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                // UTF-8 is checked by the decoder so bad bytes are reported.
                Ok(Message::Binary(bytes)) => return Some(Ok(Frame::Binary(bytes))),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Server closed stream");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        match SinkExt::close(&mut self.socket).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(ConnectionError::Close(e.to_string())),
        }
    }
}
