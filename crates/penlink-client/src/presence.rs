//! Best-effort, time-bounded signals about other users: online status and
//! typing indicators.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::trace;

use penlink_shared::constants::DEFAULT_TYPING_WINDOW_MS;
use penlink_shared::models::PresenceRecord;
use penlink_shared::time::format_last_seen;
use penlink_shared::types::{ConversationId, UserId};

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Last known status per user, rebuilt entirely from `user_status` pushes
/// and the status endpoint.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    records: HashMap<UserId, PresenceRecord>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the record for `user`. A report whose `last_seen` is older
    /// than the stored one arrived out of order and is ignored. Returns
    /// whether the record changed.
    pub fn on_status_event(&mut self, user: UserId, record: PresenceRecord) -> bool {
        if let Some(current) = self.records.get(&user) {
            if let (Some(stored), Some(incoming)) = (current.last_seen, record.last_seen) {
                if incoming < stored {
                    trace!(user = %user, "Stale presence report ignored");
                    return false;
                }
            }
            if current == &record {
                return false;
            }
        }
        self.records.insert(user, record);
        true
    }

    pub fn get(&self, user: &UserId) -> Option<&PresenceRecord> {
        self.records.get(user)
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.records.get(user).is_some_and(|r| r.online)
    }

    /// Status line for a chat header: `"Online"` or the relative last-seen
    /// text.
    pub fn status_line(&self, user: &UserId, now: DateTime<Utc>) -> String {
        match self.records.get(user) {
            Some(r) if r.online => "Online".to_string(),
            Some(r) => format_last_seen(r.last_seen, now),
            None => format_last_seen(None, now),
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

// ---------------------------------------------------------------------------
// Typing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TypingEntry {
    user: UserId,
    expires: Instant,
}

/// Who is typing in which conversation. Every entry expires on its own after
/// the window; an explicit stop clears it early.
///
/// Driven by explicit instants so the caller owns the timers.
#[derive(Debug)]
pub struct TypingTracker {
    me: UserId,
    window: Duration,
    entries: HashMap<ConversationId, TypingEntry>,
}

impl TypingTracker {
    pub fn new(me: UserId, window: Duration) -> Self {
        Self {
            me,
            window,
            entries: HashMap::new(),
        }
    }

    /// Apply a `typing_status` push. Returns whether the visible state of
    /// the conversation changed (a refresh of an active indicator does not).
    pub fn on_typing_event(
        &mut self,
        conversation: ConversationId,
        user: UserId,
        typing: bool,
        now: Instant,
    ) -> bool {
        if user == self.me {
            return false;
        }

        if typing {
            let expires = now + self.window;
            let was = self
                .entries
                .insert(conversation, TypingEntry { user: user.clone(), expires });
            return was.map_or(true, |e| e.user != user);
        }

        match self.entries.get(&conversation) {
            Some(entry) if entry.user == user => {
                self.entries.remove(&conversation);
                true
            }
            _ => false,
        }
    }

    /// The user typing in `conversation`, if the indicator has not expired.
    pub fn typing_user(&self, conversation: &ConversationId, now: Instant) -> Option<&UserId> {
        self.entries
            .get(conversation)
            .filter(|e| e.expires > now)
            .map(|e| &e.user)
    }

    /// Drop expired entries; returns the conversations that stopped typing.
    pub fn expire(&mut self, now: Instant) -> Vec<ConversationId> {
        let expired: Vec<ConversationId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }

    /// Earliest pending expiry, for the owner's timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.expires).min()
    }

    /// Forget the indicator of one conversation (its view closed).
    pub fn clear_conversation(&mut self, conversation: &ConversationId) -> bool {
        self.entries.remove(conversation).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(
            UserId::default(),
            Duration::from_millis(DEFAULT_TYPING_WINDOW_MS),
        )
    }
}
