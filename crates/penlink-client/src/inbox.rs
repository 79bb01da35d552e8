//! Local copy of the activity-notification list and its unread counter.

use penlink_shared::models::Notification;
use penlink_shared::types::NotificationId;

#[derive(Debug, Default)]
pub struct NotificationInbox {
    items: Vec<Notification>,
    unread: u32,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    /// Replace the list with a fresh fetch.
    pub fn replace(&mut self, items: Vec<Notification>) {
        self.items = items;
    }

    /// The backend's counter is authoritative whenever it is fetched.
    pub fn set_unread(&mut self, count: u32) {
        self.unread = count;
    }

    /// Prepend a pushed notification. Returns `false` for a duplicate.
    pub fn apply_incoming(&mut self, notification: Notification) -> bool {
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        if !notification.read {
            self.unread += 1;
        }
        self.items.insert(0, notification);
        true
    }

    /// Flag one notification read. Returns whether it was unread.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| &n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                self.unread = self.unread.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.read = true;
        }
        self.unread = 0;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.unread = 0;
    }
}
