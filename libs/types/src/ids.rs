//! Identifier types for wallet entities
//!
//! Account numbers and block identifiers arrive from the network as opaque
//! strings. The newtypes keep them from being mixed up with each other or
//! with free-form text such as nicknames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account number of a wallet account.
///
/// Ordered so that account sets iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create from an account number string
    pub fn new(account_number: impl Into<String>) -> Self {
        Self(account_number.into())
    }

    /// Try to create an AccountId, returning None for blank input
    pub fn try_new(account_number: impl Into<String>) -> Option<Self> {
        let s = account_number.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the account number string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a confirmed block.
///
/// The same block may be announced by several account streams; this is the
/// value used to recognise repeats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockIdentifier(String);

impl BlockIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlockIdentifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
