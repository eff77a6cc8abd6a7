//! Inbound notification events
//!
//! Every stream frame is a JSON envelope:
//!
//! ```json
//! {"notification_type": "CONFIRMATION_BLOCK_NOTIFICATION", "payload": {...}}
//! ```
//!
//! The `notification_type` selects a decoder from the `DecoderRegistry`.
//! Kinds without a registered decoder are kept as opaque JSON so they still
//! reach the log; they simply never deduplicate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use types::ids::{AccountId, BlockIdentifier};

use crate::error::DecodeError;
use crate::transport::Frame;

/// Kind emitted when a block touching a tracked account is confirmed.
pub const CONFIRMATION_BLOCK_NOTIFICATION: &str = "CONFIRMATION_BLOCK_NOTIFICATION";

/// One transfer inside a confirmed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub amount: u64,
    pub recipient: AccountId,
}

/// A confirmed block as announced on an account stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationBlock {
    pub block_identifier: BlockIdentifier,
    /// Account that signed the block.
    pub sender: AccountId,
    pub txs: Vec<Transfer>,
}

// Wire shape: payload.message.{block_identifier, block.{account_number, message.txs}}
#[derive(Deserialize)]
struct ConfirmationPayloadWire {
    message: ConfirmationMessageWire,
}

#[derive(Deserialize)]
struct ConfirmationMessageWire {
    block_identifier: BlockIdentifier,
    block: BlockWire,
}

#[derive(Deserialize)]
struct BlockWire {
    account_number: AccountId,
    message: BlockMessageWire,
}

#[derive(Deserialize)]
struct BlockMessageWire {
    #[serde(default)]
    txs: Vec<Transfer>,
}

impl From<ConfirmationPayloadWire> for ConfirmationBlock {
    fn from(wire: ConfirmationPayloadWire) -> Self {
        Self {
            block_identifier: wire.message.block_identifier,
            sender: wire.message.block.account_number,
            txs: wire.message.block.message.txs,
        }
    }
}

/// Decoded event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    ConfirmationBlock(ConfirmationBlock),
    /// Payload of a kind with no registered decoder.
    Opaque(Value),
}

impl NotificationPayload {
    /// Key used to recognise repeat deliveries of the same logical event.
    pub fn dedupe_key(&self) -> Option<String> {
        match self {
            NotificationPayload::ConfirmationBlock(block) => {
                Some(block.block_identifier.as_str().to_string())
            }
            NotificationPayload::Opaque(_) => None,
        }
    }

    pub fn as_confirmation_block(&self) -> Option<&ConfirmationBlock> {
        match self {
            NotificationPayload::ConfirmationBlock(block) => Some(block),
            NotificationPayload::Opaque(_) => None,
        }
    }
}

/// A decoded stream frame, before it enters the log.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: String,
    pub payload: NotificationPayload,
}

impl RawEvent {
    pub fn confirmation_block(block: ConfirmationBlock) -> Self {
        Self {
            kind: CONFIRMATION_BLOCK_NOTIFICATION.to_string(),
            payload: NotificationPayload::ConfirmationBlock(block),
        }
    }

    pub fn opaque(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload: NotificationPayload::Opaque(payload),
        }
    }

    pub fn dedupe_key(&self) -> Option<String> {
        self.payload.dedupe_key()
    }
}

#[derive(Deserialize)]
struct Envelope {
    notification_type: String,
    payload: Value,
}

/// Payload decoder for one notification kind.
pub type DecodeFn = fn(Value) -> Result<NotificationPayload, serde_json::Error>;

fn decode_confirmation_block(payload: Value) -> Result<NotificationPayload, serde_json::Error> {
    let wire: ConfirmationPayloadWire = serde_json::from_value(payload)?;
    Ok(NotificationPayload::ConfirmationBlock(wire.into()))
}

/// Decoders keyed by `notification_type`.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl DecoderRegistry {
    /// Registry with no decoders; every kind decodes as opaque.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register (or replace) the decoder for a kind.
    pub fn register(&mut self, kind: impl Into<String>, decoder: DecodeFn) {
        self.decoders.insert(kind.into(), decoder);
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Decode a text frame into a `RawEvent`.
    pub fn decode_frame(&self, frame: &str) -> Result<RawEvent, DecodeError> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| DecodeError::MalformedFrame(e.to_string()))?;
        self.decode_value(value)
    }

    /// Decode a frame as received from a transport.
    pub fn decode(&self, frame: &Frame) -> Result<RawEvent, DecodeError> {
        match frame {
            Frame::Text(text) => self.decode_frame(text),
            Frame::Binary(bytes) => self.decode_bytes(bytes),
        }
    }

    /// Decode a binary frame. The bytes must be valid UTF-8 JSON.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<RawEvent, DecodeError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
        self.decode_frame(text)
    }

    /// Decode an already-parsed JSON envelope.
    pub fn decode_value(&self, value: Value) -> Result<RawEvent, DecodeError> {
        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| DecodeError::MalformedFrame(e.to_string()))?;

        if envelope.notification_type.is_empty() {
            return Err(DecodeError::EmptyKind);
        }
        if !envelope.payload.is_object() {
            return Err(DecodeError::InvalidPayload {
                kind: envelope.notification_type,
                reason: "payload is not an object".to_string(),
            });
        }

        let kind = envelope.notification_type;
        match self.decoders.get(&kind) {
            Some(decode) => {
                let payload = decode(envelope.payload).map_err(|e| DecodeError::InvalidPayload {
                    kind: kind.clone(),
                    reason: e.to_string(),
                })?;
                Ok(RawEvent { kind, payload })
            }
            None => {
                debug!(kind = %kind, "No decoder registered, keeping opaque payload");
                Ok(RawEvent::opaque(kind, envelope.payload))
            }
        }
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(CONFIRMATION_BLOCK_NOTIFICATION, decode_confirmation_block);
        registry
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.decoders.keys().collect();
        kinds.sort();
        f.debug_struct("DecoderRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::metrics::FeedMetrics;
    use crate::store::{IngestOutcome, NotificationStore};
    use serde_json::json;
    use std::sync::Arc;

    fn confirmation_frame(block_identifier: &str) -> String {
        json!({
            "notification_type": CONFIRMATION_BLOCK_NOTIFICATION,
            "payload": {
                "message": {
                    "block_identifier": block_identifier,
                    "block": {
                        "account_number": "sender-account",
                        "message": {
                            "balance_key": "ignored",
                            "txs": [
                                {"amount": 25, "recipient": "recipient-a"},
                                {"amount": 1, "recipient": "bank-fee"}
                            ]
                        },
                        "signature": "ignored"
                    }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_decode_confirmation_block() {
        let registry = DecoderRegistry::default();
        let event = registry.decode_frame(&confirmation_frame("b1")).unwrap();

        assert_eq!(event.kind, CONFIRMATION_BLOCK_NOTIFICATION);
        assert_eq!(event.dedupe_key().as_deref(), Some("b1"));

        let block = event.payload.as_confirmation_block().unwrap();
        assert_eq!(block.sender.as_str(), "sender-account");
        assert_eq!(block.txs.len(), 2);
        assert_eq!(block.txs[0].amount, 25);
        assert_eq!(block.txs[0].recipient.as_str(), "recipient-a");
    }

    #[test]
    fn test_unknown_kind_is_opaque() {
        let registry = DecoderRegistry::default();
        let frame = json!({"notification_type": "PRIMARY_VALIDATOR_UPDATED", "payload": {"ip": "1.2.3.4"}});
        let event = registry.decode_value(frame).unwrap();

        assert_eq!(event.kind, "PRIMARY_VALIDATOR_UPDATED");
        assert_eq!(
            event.payload,
            NotificationPayload::Opaque(json!({"ip": "1.2.3.4"}))
        );
        assert!(event.dedupe_key().is_none());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let registry = DecoderRegistry::default();
        let err = registry.decode_frame("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedFrame(_)));
    }

    #[test]
    fn test_missing_notification_type_rejected() {
        let registry = DecoderRegistry::default();
        let err = registry.decode_frame(r#"{"payload": {}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedFrame(_)));
    }

    #[test]
    fn test_empty_kind_rejected() {
        let registry = DecoderRegistry::default();
        let err = registry
            .decode_frame(r#"{"notification_type": "", "payload": {}}"#)
            .unwrap_err();
        assert_eq!(err, DecodeError::EmptyKind);
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let registry = DecoderRegistry::default();
        let err = registry
            .decode_frame(r#"{"notification_type": "X", "payload": [1, 2]}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload { .. }));
    }

    #[test]
    fn test_confirmation_missing_block_identifier_rejected() {
        let registry = DecoderRegistry::default();
        let frame = json!({
            "notification_type": CONFIRMATION_BLOCK_NOTIFICATION,
            "payload": {"message": {"block": {"account_number": "a", "message": {"txs": []}}}}
        });
        match registry.decode_value(frame).unwrap_err() {
            DecodeError::InvalidPayload { kind, reason } => {
                assert_eq!(kind, CONFIRMATION_BLOCK_NOTIFICATION);
                assert!(reason.contains("block_identifier"), "reason: {}", reason);
            }
            err => panic!("Expected InvalidPayload, got {:?}", err),
        }
    }

    #[test]
    fn test_empty_registry_keeps_confirmation_opaque() {
        let registry = DecoderRegistry::empty();
        assert!(!registry.is_registered(CONFIRMATION_BLOCK_NOTIFICATION));

        let event = registry.decode_frame(&confirmation_frame("b1")).unwrap();
        assert!(matches!(event.payload, NotificationPayload::Opaque(_)));
        assert!(event.dedupe_key().is_none());
    }

    #[test]
    fn test_binary_frame_decoded_as_utf8() {
        let registry = DecoderRegistry::default();
        let frame = Frame::Binary(confirmation_frame("b1").into_bytes());

        let event = registry.decode(&frame).unwrap();
        assert_eq!(event.dedupe_key().as_deref(), Some("b1"));
    }

    #[test]
    fn test_invalid_utf8_binary_frame_rejected() {
        let registry = DecoderRegistry::default();
        let store = NotificationStore::new(
            Arc::new(ManualClock::new(0)),
            Arc::new(FeedMetrics::new()),
        );

        // Identifiers differing only in an invalid byte must not collapse
        // into one replacement-character key.
        for invalid in [b'\xff', b'\xfe'] {
            let mut bytes = confirmation_frame("blk#").into_bytes();
            let at = bytes.iter().position(|b| *b == b'#').unwrap();
            bytes[at] = invalid;

            let err = registry.decode(&Frame::Binary(bytes)).unwrap_err();
            assert!(matches!(err, DecodeError::InvalidUtf8(_)), "got {:?}", err);
        }

        let mut valid = Vec::new();
        for id in ["blk\u{ff}", "blk\u{fe}"] {
            let frame = Frame::Binary(confirmation_frame(id).into_bytes());
            let event = registry.decode(&frame).unwrap();
            valid.push(store.ingest(event));
        }
        assert!(valid.iter().all(|o| matches!(o, IngestOutcome::Accepted { .. })));
        assert_eq!(store.len(), 2);
    }
}
