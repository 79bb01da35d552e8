//! Merges local optimistic actions and server pushes into one consistent
//! view of the conversation list and the open thread.
//!
//! Every mutation goes through here, and every rule is commutative or
//! idempotent: messages are applied once per id, receipt sets are unioned,
//! and the conversation list is re-sorted after each change to a preview.

use std::collections::{BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;

use penlink_shared::models::{Conversation, Message, MessageDraft};
use penlink_shared::types::{ConversationId, MessageId, UserId};

use crate::error::{ClientError, Result};

/// How many applied message ids are remembered for deduplication.
const SEEN_CAPACITY: usize = 2048;

/// Outcome of [`Reconciler::apply_incoming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Appended to the open thread. `mark_read` is set when a read receipt
    /// is due for the local user.
    Appended { mark_read: Option<MessageId> },
    /// Counted against a conversation that is not open.
    Unread {
        conversation_id: ConversationId,
        unread: u32,
    },
    /// The local user's own message (sent from another device) on a
    /// conversation that is not open; only the preview moved.
    Own,
    /// Already applied once.
    Duplicate,
    /// Not in the local list; the list needs a refetch.
    UnknownConversation { conversation_id: ConversationId },
}

/// Bounded insertion-ordered set of message ids.
#[derive(Debug, Default)]
struct SeenIds {
    set: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

impl SeenIds {
    /// `false` if the id was already present.
    fn insert(&mut self, id: MessageId) -> bool {
        if self.set.contains(&id) {
            return false;
        }
        if self.order.len() == SEEN_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.set.insert(id.clone());
        self.order.push_back(id);
        true
    }
}

#[derive(Debug)]
pub struct Reconciler {
    me: UserId,
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    thread: Vec<Message>,
    seen: SeenIds,
}

impl Reconciler {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            conversations: Vec::new(),
            active: None,
            thread: Vec::new(),
            seen: SeenIds::default(),
        }
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    /// Conversations, most recent first.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    /// Messages of the open conversation in append/fetch order.
    pub fn thread(&self) -> &[Message] {
        &self.thread
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations
            .iter()
            .map(|c| c.unread_for(&self.me))
            .sum()
    }

    // -- Conversation list --

    /// Replace the list with a fresh fetch.
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        self.sort();
    }

    /// Insert or replace one conversation by id.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        match self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation.id)
        {
            Some(existing) => *existing = conversation,
            None => self.conversations.push(conversation),
        }
        self.sort();
    }

    /// Zero the local user's unread counter for a conversation.
    pub fn clear_unread(&mut self, id: &ConversationId) {
        if let Some(conv) = self.conversations.iter_mut().find(|c| &c.id == id) {
            conv.unread_count.insert(self.me.clone(), 0);
        }
    }

    // -- Thread --

    /// Make `id` the open conversation with `history` as its thread.
    ///
    /// Reloading the conversation that is already open keeps local entries
    /// the fetch does not contain (optimistic sends) after the fetched
    /// history. Returns the ids of foreign messages the local user has not
    /// read yet.
    pub fn load_thread(&mut self, id: &ConversationId, history: Vec<Message>) -> Vec<MessageId> {
        let carried: Vec<Message> = if self.active.as_ref() == Some(id) {
            let fetched: HashSet<&MessageId> = history.iter().map(|m| &m.id).collect();
            self.thread
                .drain(..)
                .filter(|m| !fetched.contains(&m.id))
                .collect()
        } else {
            Vec::new()
        };

        let unread: Vec<MessageId> = history
            .iter()
            .filter(|m| !m.is_read_by(&self.me))
            .map(|m| m.id.clone())
            .collect();

        for m in &history {
            self.seen.insert(m.id.clone());
        }

        self.active = Some(id.clone());
        self.thread = history;
        self.thread.extend(carried);
        self.clear_unread(id);
        unread
    }

    /// Close the open conversation.
    pub fn close(&mut self) {
        self.active = None;
        self.thread.clear();
    }

    /// Append `draft` to the open thread under a temporary id before the
    /// backend has confirmed it.
    pub fn apply_local_send(&mut self, draft: &MessageDraft, now: DateTime<Utc>) -> Result<MessageId> {
        let conversation_id = self.active.clone().ok_or(ClientError::NoActiveConversation)?;
        if draft.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let id = MessageId::temporary();
        let me: BTreeSet<UserId> = [self.me.clone()].into_iter().collect();
        self.thread.push(Message {
            id: id.clone(),
            conversation_id,
            sender_id: self.me.clone(),
            sender_username: String::new(),
            sender_avatar: String::new(),
            content: draft.content.clone(),
            kind: draft.kind,
            image_url: draft.image_url.clone(),
            voice_url: draft.voice_url.clone(),
            read_by: me.clone(),
            delivered_to: me,
            created_at: now,
        });
        debug!(temp = %id, "Optimistic message appended");
        Ok(id)
    }

    /// Swap the temporary entry for the backend's canonical message and move
    /// the conversation preview.
    pub fn confirm_send(&mut self, temp_id: &MessageId, canonical: Message) {
        self.seen.insert(canonical.id.clone());
        self.touch(&canonical.conversation_id, canonical.preview(), canonical.created_at);

        let Some(pos) = self.thread.iter().position(|m| &m.id == temp_id) else {
            // The view moved on while the request was in flight.
            return;
        };
        if self.thread.iter().any(|m| m.id == canonical.id) {
            self.thread.remove(pos);
        } else {
            self.thread[pos] = canonical;
        }
    }

    /// Drop a temporary entry whose send failed. Returns whether it was found.
    pub fn rollback_send(&mut self, temp_id: &MessageId) -> bool {
        let before = self.thread.len();
        self.thread.retain(|m| &m.id != temp_id);
        self.thread.len() != before
    }

    // -- Server pushes --

    /// Apply a pushed message exactly once: append it to the open thread, or
    /// count it as unread on its conversation, never both.
    pub fn apply_incoming(&mut self, message: Message) -> Incoming {
        if self.thread.iter().any(|m| m.id == message.id) || !self.seen.insert(message.id.clone())
        {
            return Incoming::Duplicate;
        }

        let conversation_id = message.conversation_id.clone();
        let own = message.sender_id == self.me;

        if self.active.as_ref() == Some(&conversation_id) {
            let mark_read = (!message.is_read_by(&self.me)).then(|| message.id.clone());
            self.touch(&conversation_id, message.preview(), message.created_at);
            self.thread.push(message);
            return Incoming::Appended { mark_read };
        }

        let me = self.me.clone();
        let Some(conv) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        else {
            return Incoming::UnknownConversation { conversation_id };
        };

        conv.last_message = Some(message.preview());
        conv.last_message_at = Some(message.created_at);

        let outcome = if own {
            Incoming::Own
        } else {
            let counter = conv.unread_count.entry(me).or_insert(0);
            *counter += 1;
            Incoming::Unread {
                conversation_id,
                unread: *counter,
            }
        };
        self.sort();
        outcome
    }

    /// Union receipt sets into the matching message of the open thread.
    /// Returns whether anything changed; re-applying an update is a no-op.
    pub fn apply_status_update(
        &mut self,
        message_id: &MessageId,
        delivered_to: Option<&BTreeSet<UserId>>,
        read_by: Option<&BTreeSet<UserId>>,
    ) -> bool {
        let Some(msg) = self.thread.iter_mut().find(|m| &m.id == message_id) else {
            return false;
        };

        let mut changed = false;
        if let Some(set) = delivered_to {
            for user in set {
                changed |= msg.delivered_to.insert(user.clone());
            }
        }
        if let Some(set) = read_by {
            for user in set {
                changed |= msg.read_by.insert(user.clone());
            }
        }
        changed
    }

    // -----------------------------------------------------------------------

    fn touch(&mut self, id: &ConversationId, preview: String, at: DateTime<Utc>) {
        if let Some(conv) = self.conversations.iter_mut().find(|c| &c.id == id) {
            conv.last_message = Some(preview);
            conv.last_message_at = Some(at);
            self.sort();
        }
    }

    fn sort(&mut self) {
        self.conversations
            .sort_by(|a, b| b.recency().cmp(&a.recency()));
    }
}
