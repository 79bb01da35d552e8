use serde::Serialize;
use tokio::sync::mpsc;

use penlink_shared::types::{ConversationId, UserId};

pub const EVENT_CONVERSATIONS_CHANGED: &str = "conversations-changed";
pub const EVENT_THREAD_CHANGED: &str = "thread-changed";
pub const EVENT_PRESENCE_CHANGED: &str = "presence-changed";
pub const EVENT_TYPING_CHANGED: &str = "typing-changed";
pub const EVENT_INBOX_CHANGED: &str = "inbox-changed";
pub const EVENT_CONNECTION_MODE_CHANGED: &str = "connection-mode-changed";

/// Health of the push channel as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Online,
    /// Degraded: REST only until the socket is back.
    Reconnecting,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationsPayload {
    pub count: usize,
    pub total_unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadPayload {
    pub conversation_id: Option<ConversationId>,
    pub messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresencePayload {
    pub user_id: UserId,
    pub online: bool,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingPayload {
    pub conversation_id: ConversationId,
    /// `None` once nobody is typing.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxPayload {
    pub unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionModePayload {
    pub mode: ConnectionMode,
}

/// State-change signal for whatever renders the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClientEvent {
    Conversations(ConversationsPayload),
    Thread(ThreadPayload),
    Presence(PresencePayload),
    Typing(TypingPayload),
    Inbox(InboxPayload),
    ConnectionMode(ConnectionModePayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Conversations(_) => EVENT_CONVERSATIONS_CHANGED,
            ClientEvent::Thread(_) => EVENT_THREAD_CHANGED,
            ClientEvent::Presence(_) => EVENT_PRESENCE_CHANGED,
            ClientEvent::Typing(_) => EVENT_TYPING_CHANGED,
            ClientEvent::Inbox(_) => EVENT_INBOX_CHANGED,
            ClientEvent::ConnectionMode(_) => EVENT_CONNECTION_MODE_CHANGED,
        }
    }
}

pub trait EventSink: Send {
    fn emit(&mut self, event: ClientEvent);
}

/// Logs every event with its JSON payload.
#[derive(Debug, Default)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn emit(&mut self, event: ClientEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "Client event"),
            Err(e) => tracing::error!(event = event.name(), error = %e, "Failed to encode event"),
        }
    }
}

/// Forwards events to a UI task.
impl EventSink for mpsc::UnboundedSender<ClientEvent> {
    fn emit(&mut self, event: ClientEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_serialize_flat() {
        let event = ClientEvent::ConnectionMode(ConnectionModePayload {
            mode: ConnectionMode::Reconnecting,
        });
        assert_eq!(event.name(), "connection-mode-changed");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"mode": "reconnecting"})
        );

        let typing = ClientEvent::Typing(TypingPayload {
            conversation_id: ConversationId::from("C1"),
            user_id: None,
        });
        assert_eq!(
            serde_json::to_value(&typing).unwrap(),
            serde_json::json!({"conversation_id": "C1", "user_id": null})
        );
    }
}
