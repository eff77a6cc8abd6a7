//! Notification bell state machine
//!
//! | From           | Trigger              | Watermark | To             |
//! |----------------|----------------------|-----------|----------------|
//! | `ClosedUnread` | bell click           | advanced  | `Open`         |
//! | `ClosedRead`   | bell click           | unchanged | `Open`         |
//! | `Open`         | bell click           | advanced  | `ClosedRead`   |
//! | `Open`         | menu close           | advanced  | `ClosedRead`   |
//! | `Open`         | navigated away       | unchanged | `ClosedRead`   |
//! | `ClosedRead`   | unread entry arrives | unchanged | `ClosedUnread` |
//!
//! Navigating away closes the menu without touching the watermark; only
//! explicit bell and close actions mark notifications read.

use std::sync::Arc;

use tracing::debug;

use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    ClosedRead,
    ClosedUnread,
    Open,
}

pub struct NotificationBell {
    store: Arc<NotificationStore>,
    state: MenuState,
    /// First store sequence not yet considered for the unread transition.
    seen_through: u64,
}

impl NotificationBell {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        let seen_through = store.next_sequence();
        Self {
            store,
            state: MenuState::ClosedRead,
            seen_through,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == MenuState::Open
    }

    /// Apply entry arrivals since the last transition.
    ///
    /// `ClosedRead` moves to `ClosedUnread` when an entry newer than the
    /// watermark has arrived; `ClosedUnread` falls back to `ClosedRead` if
    /// something else marked everything read.
    pub fn sync(&mut self) -> MenuState {
        match self.state {
            MenuState::ClosedRead => {
                if self.store.has_unread_since(self.seen_through) {
                    self.transition(MenuState::ClosedUnread);
                }
            }
            MenuState::ClosedUnread => {
                if !self.store.has_unread() {
                    self.transition(MenuState::ClosedRead);
                }
            }
            MenuState::Open => {}
        }
        self.seen_through = self.store.next_sequence();
        self.state
    }

    pub fn on_bell_click(&mut self) -> MenuState {
        self.sync();
        let next = match self.state {
            MenuState::ClosedUnread => {
                self.store.mark_read();
                MenuState::Open
            }
            MenuState::ClosedRead => MenuState::Open,
            MenuState::Open => {
                self.store.mark_read();
                MenuState::ClosedRead
            }
        };
        self.transition(next);
        self.seen_through = self.store.next_sequence();
        self.state
    }

    /// Explicit close from inside the menu. No-op unless open.
    pub fn on_menu_close(&mut self) -> MenuState {
        if self.state == MenuState::Open {
            self.store.mark_read();
            self.transition(MenuState::ClosedRead);
            self.seen_through = self.store.next_sequence();
        }
        self.state
    }

    /// Route change while the menu is up. Closes without marking read.
    pub fn on_navigated_away(&mut self) -> MenuState {
        if self.state == MenuState::Open {
            self.transition(MenuState::ClosedRead);
            self.seen_through = self.store.next_sequence();
        }
        self.state
    }

    fn transition(&mut self, next: MenuState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Bell state change");
            self.state = next;
        }
    }
}
