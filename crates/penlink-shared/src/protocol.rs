//! Frames exchanged over the `/ws/notifications/{userId}` socket.
//!
//! Inbound text is decoded exactly once, here, into [`InboundFrame`]; every
//! consumer downstream matches on typed variants.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{HEARTBEAT_FRAME, HEARTBEAT_REPLY};
use crate::error::PenlinkError;
use crate::models::{Message, Notification};
use crate::types::{ConversationId, MessageId, UserId};

/// A server-pushed event.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A chat message addressed to this user.
    NewMessage { message: Message },

    /// An activity notification (follow, like, comment, reply).
    #[serde(alias = "notification")]
    NewNotification { notification: Notification },

    /// Another user came online or went offline.
    UserStatus {
        user_id: UserId,
        online: bool,
        #[serde(default)]
        last_seen: Option<DateTime<Utc>>,
    },

    /// Another user started or stopped typing in a conversation.
    #[serde(alias = "typing")]
    TypingStatus {
        conversation_id: ConversationId,
        user_id: UserId,
        typing: bool,
    },

    /// Delivery/read receipts for one message. Absent sets leave the local
    /// copy untouched.
    MessageStatus {
        message_id: MessageId,
        #[serde(default)]
        delivered_to: Option<BTreeSet<UserId>>,
        #[serde(default)]
        read_by: Option<BTreeSet<UserId>>,
    },
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to our keepalive; carries nothing.
    Heartbeat,
    Event(InboundEvent),
}

impl InboundFrame {
    /// Decode a text frame. The literal `pong` and `{"type":"pong"}` are both
    /// heartbeat replies.
    pub fn decode(text: &str) -> Result<Self, PenlinkError> {
        let text = text.trim();
        if text == HEARTBEAT_REPLY {
            return Ok(Self::Heartbeat);
        }

        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| PenlinkError::Protocol("frame has no `type` field".into()))?;

        if kind == HEARTBEAT_REPLY {
            return Ok(Self::Heartbeat);
        }

        Ok(Self::Event(InboundEvent::deserialize(value)?))
    }
}

/// Control frames sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Heartbeat,
    Typing {
        conversation_id: ConversationId,
        typing: bool,
    },
}

#[derive(Serialize)]
struct TypingFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    conversation_id: &'a ConversationId,
    typing: bool,
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, PenlinkError> {
        match self {
            Self::Heartbeat => Ok(HEARTBEAT_FRAME.to_string()),
            Self::Typing {
                conversation_id,
                typing,
            } => Ok(serde_json::to_string(&TypingFrame {
                kind: "typing",
                conversation_id,
                typing: *typing,
            })?),
        }
    }
}
