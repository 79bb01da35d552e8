//! Domain models as served by the PenLink backend.
//!
//! The client holds read-through copies of these; every struct derives both
//! `Serialize` and `Deserialize` so it can be handed to a UI layer unchanged.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{PHOTO_PREVIEW, VOICE_PREVIEW};
use crate::types::{ConversationId, MessageId, NotificationId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The authenticated account, as returned by `GET /auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: String,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Display details of one participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantDetail {
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
}

/// A two-party conversation with its denormalized last-message preview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub participant_details: Vec<ParticipantDetail>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Per-participant unread counters.
    #[serde(default)]
    pub unread_count: HashMap<UserId, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Sort key of the conversation list: the later of `last_message_at`
    /// and `updated_at`.
    pub fn recency(&self) -> DateTime<Utc> {
        match self.last_message_at {
            Some(at) if at > self.updated_at => at,
            _ => self.updated_at,
        }
    }

    pub fn unread_for(&self, user: &UserId) -> u32 {
        self.unread_count.get(user).copied().unwrap_or(0)
    }

    /// The participant that is not `me`.
    pub fn other_participant(&self, me: &UserId) -> Option<&ParticipantDetail> {
        self.participant_details.iter().find(|p| &p.user_id != me)
    }

    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Voice,
}

/// A single chat message. Content is immutable once created; only the
/// receipt sets change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_username: String,
    #[serde(default)]
    pub sender_avatar: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub voice_url: Option<String>,
    /// Users that have opened the message; always contains the sender.
    #[serde(default)]
    pub read_by: BTreeSet<UserId>,
    /// Users that have received the message; always contains the sender.
    #[serde(default)]
    pub delivered_to: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Read by someone other than the sender.
    pub fn is_read(&self) -> bool {
        self.read_by.len() > 1
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered_to.len() > 1
    }

    pub fn is_read_by(&self, user: &UserId) -> bool {
        user == &self.sender_id || self.read_by.contains(user)
    }

    /// Text shown as the conversation's last-message preview.
    pub fn preview(&self) -> String {
        preview_text(&self.content, self.kind)
    }
}

pub fn preview_text(content: &str, kind: MessageKind) -> String {
    if !content.is_empty() {
        return content.to_string();
    }
    match kind {
        MessageKind::Voice => VOICE_PREVIEW.to_string(),
        MessageKind::Image | MessageKind::Text => PHOTO_PREVIEW.to_string(),
    }
}

/// A message composed locally, before the backend has assigned it an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDraft {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_url: Option<String>,
}

impl MessageDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Image,
            image_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn voice(url: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Voice,
            voice_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.image_url.is_none() && self.voice_url.is_none()
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Follow,
    Like,
    Comment,
    Reply,
    #[serde(other)]
    Other,
}

/// An activity notification (follow, like, comment, reply).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub actor_id: UserId,
    pub actor_username: String,
    #[serde(default)]
    pub actor_avatar: String,
    #[serde(default)]
    pub post_id: Option<String>,
    /// `"blog"` for blog targets, anything else for short posts.
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn targets_blog(&self) -> bool {
        self.post_type.as_deref() == Some("blog")
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Online status of a user, as reported by `GET /users/{id}/status` or a
/// `user_status` push.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceRecord {
    pub online: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}
