//! Error taxonomy for the notification feed
//!
//! Nothing here is fatal to the feed. Decode failures drop one frame,
//! connection failures end one stream; both are handed to the error
//! reporter and processing continues everywhere else.

use thiserror::Error;

/// A stream frame could not be turned into a notification event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Binary frame is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Frame has an empty notification_type")]
    EmptyKind,

    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

/// Transport-level failures.
///
/// These only ever end a single account's stream; retry and backoff belong
/// to whoever supplies the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to close stream: {0}")]
    Close(String),
}

/// Error handed to the error reporter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Invalid feed configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Endpoint template must contain {{account}}: {0}")]
    MissingPlaceholder(String),
}
