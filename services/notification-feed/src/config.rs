//! Feed configuration
//!
//! Defaults match the public confirmation-block stream. Environment
//! variables override individual fields.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::events::CONFIRMATION_BLOCK_NOTIFICATION;
use crate::transport::websocket::ACCOUNT_PLACEHOLDER;

pub const ENV_ENDPOINT: &str = "NOTIFICATION_FEED_ENDPOINT";
pub const ENV_QUEUE_CAPACITY: &str = "NOTIFICATION_FEED_QUEUE_CAPACITY";

/// Configuration for the notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Stream endpoint; `{account}` is replaced by the account number.
    pub endpoint_template: String,
    /// Frames buffered per connection before the reader waits.
    pub queue_capacity: usize,
    /// Kind listed by the presentation layer.
    pub display_kind: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint_template: "ws://143.110.137.54/ws/confirmation_blocks/{account}".to_string(),
            queue_capacity: 256,
            display_kind: CONFIRMATION_BLOCK_NOTIFICATION.to_string(),
        }
    }
}

impl FeedConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint_template = endpoint;
        }
        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_QUEUE_CAPACITY,
                    value: raw.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_template.contains(ACCOUNT_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(self.endpoint_template.clone()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_QUEUE_CAPACITY,
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
