//! One logged-in session: the reconciled conversation state, presence and
//! typing signals, the notification inbox, and the REST calls that feed them.
//!
//! [`ClientSession`] is owned by a single task (see [`crate::bridge`]), so
//! REST responses and socket pushes are applied one at a time, in arrival
//! order, without locks.

use std::collections::BTreeSet;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use penlink_net::ConnectionNotification;
use penlink_shared::models::{Message, MessageDraft, PresenceRecord, User};
use penlink_shared::protocol::{InboundEvent, OutboundFrame};
use penlink_shared::types::{ConversationId, MessageId, NotificationId, UserId};

use crate::api::MessagingApi;
use crate::dispatcher::{Dispatcher, Route};
use crate::error::{ClientError, Result};
use crate::events::{
    ClientEvent, ConnectionMode, ConnectionModePayload, ConversationsPayload, EventSink,
    InboxPayload, PresencePayload, ThreadPayload, TypingPayload,
};
use crate::inbox::NotificationInbox;
use crate::presence::{PresenceTracker, TypingTracker};
use crate::reconciler::{Incoming, Reconciler};

/// Session construction parameters that are not collaborators.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub typing_window: std::time::Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            typing_window: std::time::Duration::from_millis(
                penlink_shared::constants::DEFAULT_TYPING_WINDOW_MS,
            ),
        }
    }
}

pub struct ClientSession<A> {
    api: A,
    me: User,
    reconciler: Reconciler,
    presence: PresenceTracker,
    typing: TypingTracker,
    inbox: NotificationInbox,
    dispatcher: Dispatcher,
    events: Box<dyn EventSink>,
    mode: ConnectionMode,
}

impl<A: MessagingApi> ClientSession<A> {
    pub fn new(
        api: A,
        me: User,
        dispatcher: Dispatcher,
        events: Box<dyn EventSink>,
        options: SessionOptions,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(me.id.clone()),
            typing: TypingTracker::new(me.id.clone(), options.typing_window),
            presence: PresenceTracker::new(),
            inbox: NotificationInbox::new(),
            api,
            me,
            dispatcher,
            events,
            mode: ConnectionMode::Offline,
        }
    }

    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    // -- Loading --

    /// Initial load after login: conversation list, presence of every
    /// participant, and the notification inbox.
    pub async fn bootstrap(&mut self) -> Result<()> {
        self.refresh_conversations().await?;
        if let Err(e) = self.refresh_notifications().await {
            warn!(error = %e, "Notification inbox unavailable");
        }
        Ok(())
    }

    /// Refetch the conversation list and seed presence for its participants.
    pub async fn refresh_conversations(&mut self) -> Result<()> {
        let conversations = match self.api.list_conversations().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Failed to load conversations");
                self.dispatcher.error("Failed to load conversations");
                return Err(e.into());
            }
        };

        let peers: BTreeSet<UserId> = conversations
            .iter()
            .flat_map(|c| c.participants.iter())
            .filter(|p| **p != self.me.id)
            .cloned()
            .collect();

        info!(count = conversations.len(), "Conversations loaded");
        self.reconciler.set_conversations(conversations);
        self.emit_conversations();

        for peer in peers {
            match self.api.user_status(&peer).await {
                Ok(record) => self.apply_presence(peer, record),
                Err(e) => debug!(user = %peer, error = %e, "Presence lookup failed"),
            }
        }
        Ok(())
    }

    /// Reload the inbox. A failed counter keeps the fetched list and the
    /// previous count.
    pub async fn refresh_notifications(&mut self) -> Result<()> {
        let items = self.api.notifications().await?;
        self.inbox.replace(items);

        match self.api.unread_notification_count().await {
            Ok(unread) => self.inbox.set_unread(unread),
            Err(e) => warn!(error = %e, "Failed to load unread notification count"),
        }
        self.emit_inbox();
        Ok(())
    }

    // -- Conversations --

    /// Load a conversation's history into the thread and acknowledge it.
    pub async fn open_conversation(&mut self, id: &ConversationId) -> Result<()> {
        let history = match self.api.conversation_messages(id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(conversation = %id, error = %e, "Failed to load messages");
                self.dispatcher.error("Failed to load messages");
                return Err(e.into());
            }
        };

        if let Some(previous) = self.reconciler.active().cloned() {
            if &previous != id && self.typing.clear_conversation(&previous) {
                self.emit_typing(previous);
            }
        }

        let unread = self.reconciler.load_thread(id, history);
        debug!(conversation = %id, receipts = unread.len(), "Conversation opened");
        self.emit_thread();
        self.emit_conversations();

        if let Err(e) = self.api.mark_conversation_read(id).await {
            warn!(conversation = %id, error = %e, "Failed to mark conversation read");
        }
        for message_id in unread {
            send_read_receipt(&self.api, &message_id).await;
        }
        Ok(())
    }

    /// Close the open conversation and drop its typing indicator.
    pub fn close_conversation(&mut self) {
        let Some(id) = self.reconciler.active().cloned() else {
            return;
        };
        self.reconciler.close();
        if self.typing.clear_conversation(&id) {
            self.emit_typing(id);
        }
        self.emit_thread();
    }

    /// Existing or new conversation with `recipient`.
    pub async fn start_conversation(&mut self, recipient: &UserId) -> Result<ConversationId> {
        match self.api.start_conversation(recipient).await {
            Ok(conversation) => {
                let id = conversation.id.clone();
                self.reconciler.upsert_conversation(conversation);
                self.emit_conversations();
                Ok(id)
            }
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Failed to start conversation");
                self.dispatcher.error("Failed to start conversation");
                Err(e.into())
            }
        }
    }

    // -- Sending --

    /// Send into the open conversation, optimistically. On failure the
    /// pending entry is removed, an error toast is shown and the error is
    /// returned; nothing is retried.
    pub async fn send_message(&mut self, draft: MessageDraft) -> Result<MessageId> {
        let conversation_id = self
            .reconciler
            .active()
            .cloned()
            .ok_or(ClientError::NoActiveConversation)?;

        let temp = self.reconciler.apply_local_send(&draft, Utc::now())?;
        self.emit_thread();

        match self.api.send_message(&conversation_id, &draft).await {
            Ok(message) => {
                let id = message.id.clone();
                debug!(conversation = %conversation_id, message = %id, "Message sent");
                self.reconciler.confirm_send(&temp, message);
                self.emit_thread();
                self.emit_conversations();
                Ok(id)
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "Failed to send message");
                self.reconciler.rollback_send(&temp);
                self.emit_thread();
                self.dispatcher.error("Failed to send message");
                Err(e.into())
            }
        }
    }

    /// Typing signal for the open conversation, if any.
    pub fn typing_frame(&self, typing: bool) -> Option<OutboundFrame> {
        self.reconciler
            .active()
            .map(|conversation_id| OutboundFrame::Typing {
                conversation_id: conversation_id.clone(),
                typing,
            })
    }

    // -- Notifications --

    /// Mark one notification read and return where clicking it leads.
    pub async fn mark_notification_read(&mut self, id: &NotificationId) -> Result<Option<Route>> {
        let Some(notification) = self.inbox.items().iter().find(|n| &n.id == id).cloned() else {
            return Ok(None);
        };

        if !notification.read {
            if let Err(e) = self.api.mark_notification_read(id).await {
                warn!(notification = %id, error = %e, "Failed to mark notification read");
                self.dispatcher.error("Failed to mark as read");
                return Err(e.into());
            }
            self.inbox.mark_read(id);
            self.emit_inbox();
        }
        Ok(Route::for_notification(&notification))
    }

    pub async fn mark_all_notifications_read(&mut self) -> Result<()> {
        if let Err(e) = self.api.mark_all_notifications_read().await {
            warn!(error = %e, "Failed to mark notifications read");
            self.dispatcher.error("Failed to mark as read");
            return Err(e.into());
        }
        self.inbox.mark_all_read();
        self.emit_inbox();
        Ok(())
    }

    // -- Pushes --

    pub async fn handle_connection(&mut self, notification: ConnectionNotification) {
        match notification {
            ConnectionNotification::Event(event) => self.handle_event(event).await,
            ConnectionNotification::Connecting { attempt } => {
                trace!(attempt, "Notification socket connecting");
            }
            ConnectionNotification::Connected => {
                let resync = self.mode == ConnectionMode::Reconnecting;
                self.set_mode(ConnectionMode::Online);
                if resync {
                    self.resync().await;
                }
            }
            ConnectionNotification::Disconnected { intentional } => {
                self.set_mode(if intentional {
                    ConnectionMode::Offline
                } else {
                    ConnectionMode::Reconnecting
                });
            }
            ConnectionNotification::ReconnectScheduled { delay } => {
                debug!(delay_ms = delay.as_millis() as u64, "Reconnect pending");
                self.set_mode(ConnectionMode::Reconnecting);
            }
        }
    }

    pub async fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::NewMessage { message } => self.on_new_message(message).await,

            InboundEvent::NewNotification { notification } => {
                if self.inbox.apply_incoming(notification.clone()) {
                    self.dispatcher.notification(&notification);
                    self.emit_inbox();
                }
            }

            InboundEvent::UserStatus {
                user_id,
                online,
                last_seen,
            } => self.apply_presence(user_id, PresenceRecord { online, last_seen }),

            InboundEvent::TypingStatus {
                conversation_id,
                user_id,
                typing,
            } => {
                if self.typing.on_typing_event(
                    conversation_id.clone(),
                    user_id,
                    typing,
                    Instant::now(),
                ) {
                    self.emit_typing(conversation_id);
                }
            }

            InboundEvent::MessageStatus {
                message_id,
                delivered_to,
                read_by,
            } => {
                if self.reconciler.apply_status_update(
                    &message_id,
                    delivered_to.as_ref(),
                    read_by.as_ref(),
                ) {
                    self.emit_thread();
                }
            }
        }
    }

    /// Clear typing indicators whose window has passed.
    pub fn expire_typing(&mut self, now: Instant) {
        for conversation_id in self.typing.expire(now) {
            self.emit_typing(conversation_id);
        }
    }

    pub fn next_typing_deadline(&self) -> Option<Instant> {
        self.typing.next_deadline()
    }

    /// Drop everything this session knows.
    pub fn logout(&mut self) {
        self.reconciler.close();
        self.reconciler.set_conversations(Vec::new());
        self.presence.clear();
        self.typing.clear();
        self.inbox.clear();
        self.set_mode(ConnectionMode::Offline);
        self.emit_thread();
        self.emit_conversations();
        self.emit_inbox();
        info!(user = %self.me.id, "Session cleared");
    }

    // -----------------------------------------------------------------------

    async fn on_new_message(&mut self, message: Message) {
        match self.reconciler.apply_incoming(message.clone()) {
            Incoming::Appended { mark_read } => {
                self.emit_thread();
                self.emit_conversations();
                if let Some(id) = mark_read {
                    send_read_receipt(&self.api, &id).await;
                }
            }
            Incoming::Unread {
                conversation_id,
                unread,
            } => {
                debug!(conversation = %conversation_id, unread, "Unread message");
                self.dispatcher.message(&message);
                self.emit_conversations();
            }
            Incoming::Own => self.emit_conversations(),
            Incoming::Duplicate => trace!(message = %message.id, "Duplicate push dropped"),
            Incoming::UnknownConversation { conversation_id } => {
                info!(conversation = %conversation_id, "Message for unknown conversation; refetching");
                if self.refresh_conversations().await.is_ok() && message.sender_id != self.me.id {
                    self.dispatcher.message(&message);
                }
            }
        }
    }

    /// After a gap in the push stream, pull what may have been missed.
    async fn resync(&mut self) {
        info!("Push channel restored; resyncing");
        if let Err(e) = self.refresh_conversations().await {
            debug!(error = %e, "Resync of conversations failed");
        }
        if let Some(active) = self.reconciler.active().cloned() {
            if let Err(e) = self.open_conversation(&active).await {
                debug!(error = %e, "Resync of open conversation failed");
            }
        }
        if let Err(e) = self.refresh_notifications().await {
            debug!(error = %e, "Resync of notifications failed");
        }
    }

    fn apply_presence(&mut self, user: UserId, record: PresenceRecord) {
        if !self.presence.on_status_event(user.clone(), record) {
            return;
        }
        let payload = PresencePayload {
            online: self.presence.is_online(&user),
            status: self.presence.status_line(&user, Utc::now()),
            user_id: user,
        };
        self.events.emit(ClientEvent::Presence(payload));
    }

    fn set_mode(&mut self, mode: ConnectionMode) {
        if self.mode == mode {
            return;
        }
        info!(?mode, "Connection mode changed");
        self.mode = mode;
        self.events
            .emit(ClientEvent::ConnectionMode(ConnectionModePayload { mode }));
    }

    fn emit_conversations(&mut self) {
        let payload = ConversationsPayload {
            count: self.reconciler.conversations().len(),
            total_unread: self.reconciler.total_unread(),
        };
        self.events.emit(ClientEvent::Conversations(payload));
    }

    fn emit_thread(&mut self) {
        let payload = ThreadPayload {
            conversation_id: self.reconciler.active().cloned(),
            messages: self.reconciler.thread().len(),
        };
        self.events.emit(ClientEvent::Thread(payload));
    }

    fn emit_typing(&mut self, conversation_id: ConversationId) {
        let user_id = self
            .typing
            .typing_user(&conversation_id, Instant::now())
            .cloned();
        self.events.emit(ClientEvent::Typing(TypingPayload {
            conversation_id,
            user_id,
        }));
    }

    fn emit_inbox(&mut self) {
        let unread = self.inbox.unread();
        self.events.emit(ClientEvent::Inbox(InboxPayload { unread }));
    }
}

async fn send_read_receipt<A: MessagingApi>(api: &A, id: &MessageId) {
    if let Err(e) = api.mark_message_read(id).await {
        debug!(message = %id, error = %e, "Read receipt failed");
    }
}
