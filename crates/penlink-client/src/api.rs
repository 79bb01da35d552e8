//! The REST surface the session depends on, as a trait so tests can swap in
//! an in-memory backend.

use std::future::Future;

use penlink_net::{ApiClient, NetError};
use penlink_shared::models::{
    Conversation, Message, MessageDraft, Notification, PresenceRecord, User,
};
use penlink_shared::types::{ConversationId, MessageId, NotificationId, UserId};

pub trait MessagingApi: Send + Sync {
    fn current_user(&self) -> impl Future<Output = Result<User, NetError>> + Send;

    fn list_conversations(&self)
        -> impl Future<Output = Result<Vec<Conversation>, NetError>> + Send;

    fn start_conversation(
        &self,
        recipient: &UserId,
    ) -> impl Future<Output = Result<Conversation, NetError>> + Send;

    fn conversation_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>, NetError>> + Send;

    fn mark_conversation_read(
        &self,
        conversation_id: &ConversationId,
    ) -> impl Future<Output = Result<(), NetError>> + Send;

    fn send_message(
        &self,
        conversation_id: &ConversationId,
        draft: &MessageDraft,
    ) -> impl Future<Output = Result<Message, NetError>> + Send;

    fn mark_message_read(
        &self,
        message_id: &MessageId,
    ) -> impl Future<Output = Result<(), NetError>> + Send;

    fn notifications(&self) -> impl Future<Output = Result<Vec<Notification>, NetError>> + Send;

    fn unread_notification_count(&self) -> impl Future<Output = Result<u32, NetError>> + Send;

    fn mark_notification_read(
        &self,
        id: &NotificationId,
    ) -> impl Future<Output = Result<(), NetError>> + Send;

    fn mark_all_notifications_read(&self) -> impl Future<Output = Result<(), NetError>> + Send;

    fn user_status(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<PresenceRecord, NetError>> + Send;
}

impl MessagingApi for ApiClient {
    fn current_user(&self) -> impl Future<Output = Result<User, NetError>> + Send {
        ApiClient::current_user(self)
    }

    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<Conversation>, NetError>> + Send {
        ApiClient::list_conversations(self)
    }

    fn start_conversation(
        &self,
        recipient: &UserId,
    ) -> impl Future<Output = Result<Conversation, NetError>> + Send {
        ApiClient::start_conversation(self, recipient)
    }

    fn conversation_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>, NetError>> + Send {
        ApiClient::conversation_messages(self, conversation_id)
    }

    fn mark_conversation_read(
        &self,
        conversation_id: &ConversationId,
    ) -> impl Future<Output = Result<(), NetError>> + Send {
        ApiClient::mark_conversation_read(self, conversation_id)
    }

    fn send_message(
        &self,
        conversation_id: &ConversationId,
        draft: &MessageDraft,
    ) -> impl Future<Output = Result<Message, NetError>> + Send {
        ApiClient::send_message(self, conversation_id, draft)
    }

    fn mark_message_read(
        &self,
        message_id: &MessageId,
    ) -> impl Future<Output = Result<(), NetError>> + Send {
        ApiClient::mark_message_read(self, message_id)
    }

    fn notifications(&self) -> impl Future<Output = Result<Vec<Notification>, NetError>> + Send {
        ApiClient::notifications(self)
    }

    fn unread_notification_count(&self) -> impl Future<Output = Result<u32, NetError>> + Send {
        ApiClient::unread_notification_count(self)
    }

    fn mark_notification_read(
        &self,
        id: &NotificationId,
    ) -> impl Future<Output = Result<(), NetError>> + Send {
        ApiClient::mark_notification_read(self, id)
    }

    fn mark_all_notifications_read(&self) -> impl Future<Output = Result<(), NetError>> + Send {
        ApiClient::mark_all_notifications_read(self)
    }

    fn user_status(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<PresenceRecord, NetError>> + Send {
        ApiClient::user_status(self, user_id)
    }
}
