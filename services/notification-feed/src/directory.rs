//! Account directory
//!
//! Managed accounts and friends known to the wallet. Managed accounts are
//! the ones whose streams the feed tracks; both lists feed display names.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use types::ids::AccountId;

const NICKNAME_DISPLAY_CHARS: usize = 16;
const ACCOUNT_NUMBER_DISPLAY_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_number: AccountId,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl AccountRecord {
    pub fn new(account_number: AccountId) -> Self {
        Self {
            account_number,
            nickname: None,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    fn display_name(&self) -> String {
        match self.nickname.as_deref().filter(|n| !n.is_empty()) {
            Some(nickname) => truncate(nickname, NICKNAME_DISPLAY_CHARS),
            None => truncate(self.account_number.as_str(), ACCOUNT_NUMBER_DISPLAY_CHARS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBook {
    managed: BTreeMap<AccountId, AccountRecord>,
    friends: BTreeMap<AccountId, AccountRecord>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_managed(&mut self, record: AccountRecord) {
        self.managed.insert(record.account_number.clone(), record);
    }

    pub fn remove_managed(&mut self, account: &AccountId) -> Option<AccountRecord> {
        self.managed.remove(account)
    }

    pub fn add_friend(&mut self, record: AccountRecord) {
        self.friends.insert(record.account_number.clone(), record);
    }

    /// Accounts whose notification streams should be open.
    pub fn tracked_accounts(&self) -> BTreeSet<AccountId> {
        self.managed.keys().cloned().collect()
    }

    /// Short label for an account: managed first, then friends, else the
    /// raw account number.
    pub fn display_name(&self, account: &AccountId) -> String {
        self.managed
            .get(account)
            .or_else(|| self.friends.get(account))
            .map(AccountRecord::display_name)
            .unwrap_or_else(|| account.as_str().to_string())
    }
}

fn truncate(s: &str, chars: usize) -> String {
    match s.char_indices().nth(chars) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_ACCOUNT: &str = "0cdd4ba04456ca169baca3d66eace869520c62fe84421329086e03d91a68acdb";

    #[test]
    fn test_tracked_accounts_are_managed_only() {
        let mut book = AccountBook::new();
        book.add_managed(AccountRecord::new(AccountId::new("a")));
        book.add_managed(AccountRecord::new(AccountId::new("b")));
        book.add_friend(AccountRecord::new(AccountId::new("f")));

        let tracked: Vec<AccountId> = book.tracked_accounts().into_iter().collect();
        assert_eq!(tracked, vec![AccountId::new("a"), AccountId::new("b")]);

        book.remove_managed(&AccountId::new("a"));
        assert_eq!(book.tracked_accounts().len(), 1);
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        let mut book = AccountBook::new();
        book.add_managed(AccountRecord::new(AccountId::new(LONG_ACCOUNT)).with_nickname("Savings"));
        assert_eq!(book.display_name(&AccountId::new(LONG_ACCOUNT)), "Savings");
    }

    #[test]
    fn test_display_name_truncation() {
        let mut book = AccountBook::new();
        book.add_managed(AccountRecord::new(AccountId::new(LONG_ACCOUNT)));
        book.add_friend(
            AccountRecord::new(AccountId::new("friend")).with_nickname("A very long friend nickname"),
        );

        assert_eq!(book.display_name(&AccountId::new(LONG_ACCOUNT)), "0cdd4ba0...");
        assert_eq!(book.display_name(&AccountId::new("friend")), "A very long frie...");
    }

    #[test]
    fn test_managed_wins_over_friend() {
        let mut book = AccountBook::new();
        book.add_friend(AccountRecord::new(AccountId::new("x")).with_nickname("Friend"));
        book.add_managed(AccountRecord::new(AccountId::new("x")).with_nickname("Mine"));
        assert_eq!(book.display_name(&AccountId::new("x")), "Mine");
    }

    #[test]
    fn test_unknown_account_is_raw() {
        let book = AccountBook::new();
        assert_eq!(book.display_name(&AccountId::new(LONG_ACCOUNT)), LONG_ACCOUNT);
    }

    #[test]
    fn test_truncate_short_and_multibyte() {
        assert_eq!(truncate("abc", 8), "abc");
        assert_eq!(truncate("12345678", 8), "12345678");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
