//! The session task: one loop that owns [`ClientSession`] and the
//! [`ConnectionManager`], and serializes UI commands, socket notifications
//! and timers into them.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use penlink_net::{ConnectionManager, ConnectionNotification};
use penlink_shared::models::MessageDraft;
use penlink_shared::types::{ConversationId, MessageId, NotificationId, UserId};

use crate::api::MessagingApi;
use crate::dispatcher::Route;
use crate::error::{ClientError, Result};
use crate::session::ClientSession;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Commands sent *into* the session task.
#[derive(Debug)]
pub enum SessionCommand {
    OpenConversation {
        id: ConversationId,
        reply: Reply<()>,
    },
    CloseConversation,
    StartConversation {
        recipient: UserId,
        reply: Reply<ConversationId>,
    },
    SendMessage {
        draft: MessageDraft,
        reply: Reply<MessageId>,
    },
    /// The local user pressed a key in the composer.
    Typing,
    MarkNotificationRead {
        id: NotificationId,
        reply: Reply<Option<Route>>,
    },
    MarkAllNotificationsRead {
        reply: Reply<()>,
    },
    RefreshConversations,
    RefreshNotifications,
    SetVisible(bool),
    /// Disconnect, forget the session state and stop.
    Logout,
    /// Disconnect and stop.
    Shutdown,
}

/// Timing of the session task.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub typing_idle: Duration,
    pub notification_poll: Duration,
}

/// Cloneable handle to a running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn open_conversation(&self, id: ConversationId) -> Result<()> {
        self.request(|reply| SessionCommand::OpenConversation { id, reply })
            .await
    }

    pub async fn close_conversation(&self) -> Result<()> {
        self.send(SessionCommand::CloseConversation).await
    }

    pub async fn start_conversation(&self, recipient: UserId) -> Result<ConversationId> {
        self.request(|reply| SessionCommand::StartConversation { recipient, reply })
            .await
    }

    pub async fn send_message(&self, draft: MessageDraft) -> Result<MessageId> {
        self.request(|reply| SessionCommand::SendMessage { draft, reply })
            .await
    }

    pub async fn typing(&self) -> Result<()> {
        self.send(SessionCommand::Typing).await
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<Option<Route>> {
        self.request(|reply| SessionCommand::MarkNotificationRead { id, reply })
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        self.request(|reply| SessionCommand::MarkAllNotificationsRead { reply })
            .await
    }

    pub async fn refresh_conversations(&self) -> Result<()> {
        self.send(SessionCommand::RefreshConversations).await
    }

    pub async fn refresh_notifications(&self) -> Result<()> {
        self.send(SessionCommand::RefreshNotifications).await
    }

    pub async fn set_visible(&self, visible: bool) -> Result<()> {
        self.send(SessionCommand::SetVisible(visible)).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.send(SessionCommand::Logout).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| ClientError::SessionClosed)?
    }
}

/// Connect the manager for the session's user and spawn the session task.
/// The task ends on `Shutdown`/`Logout` or when every handle is dropped;
/// either way the socket is closed and all timers die with it.
pub fn spawn_session<A>(
    session: ClientSession<A>,
    manager: ConnectionManager,
    notif_rx: mpsc::Receiver<ConnectionNotification>,
    config: BridgeConfig,
) -> (SessionHandle, JoinHandle<()>)
where
    A: MessagingApi + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let task = SessionTask {
        session,
        manager,
        notif_rx,
        cmd_rx,
        config,
        typing_idle_deadline: None,
    };
    let handle = tokio::spawn(task.run());
    (SessionHandle { cmd_tx }, handle)
}

struct SessionTask<A> {
    session: ClientSession<A>,
    manager: ConnectionManager,
    notif_rx: mpsc::Receiver<ConnectionNotification>,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    config: BridgeConfig,
    /// When the local `typing: false` frame is due.
    typing_idle_deadline: Option<Instant>,
}

impl<A: MessagingApi + 'static> SessionTask<A> {
    async fn run(mut self) {
        let me = self.session.me().id.clone();
        self.manager.connect(&me);
        info!(user = %me, "Session task started");

        let period = self.config.notification_poll;
        let mut poll = tokio::time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let typing_expiry = self.session.next_typing_deadline();
            let typing_idle = self.typing_idle_deadline;

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(SessionCommand::Logout) => {
                        self.manager.disconnect().await;
                        self.session.logout();
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                },

                Some(notification) = self.notif_rx.recv() => {
                    self.session.handle_connection(notification).await;
                }

                _ = sleep_until_opt(typing_expiry) => {
                    self.session.expire_typing(Instant::now());
                }

                _ = sleep_until_opt(typing_idle) => {
                    self.typing_idle_deadline = None;
                    self.send_typing(false).await;
                }

                _ = poll.tick() => {
                    if let Err(e) = self.session.refresh_notifications().await {
                        debug!(error = %e, "Notification poll failed");
                    }
                }
            }
        }

        self.manager.disconnect().await;
        info!(user = %me, "Session task stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::OpenConversation { id, reply } => {
                self.stop_typing().await;
                let res = self.session.open_conversation(&id).await;
                let _ = reply.send(res);
            }
            SessionCommand::CloseConversation => {
                self.stop_typing().await;
                self.session.close_conversation();
            }
            SessionCommand::StartConversation { recipient, reply } => {
                let res = self.session.start_conversation(&recipient).await;
                let _ = reply.send(res);
            }
            SessionCommand::SendMessage { draft, reply } => {
                let res = self.session.send_message(draft).await;
                if res.is_ok() {
                    self.stop_typing().await;
                }
                let _ = reply.send(res);
            }
            SessionCommand::Typing => {
                if self.session.typing_frame(true).is_some() {
                    self.send_typing(true).await;
                    self.typing_idle_deadline = Some(Instant::now() + self.config.typing_idle);
                }
            }
            SessionCommand::MarkNotificationRead { id, reply } => {
                let res = self.session.mark_notification_read(&id).await;
                let _ = reply.send(res);
            }
            SessionCommand::MarkAllNotificationsRead { reply } => {
                let res = self.session.mark_all_notifications_read().await;
                let _ = reply.send(res);
            }
            SessionCommand::RefreshConversations => {
                if let Err(e) = self.session.refresh_conversations().await {
                    debug!(error = %e, "Conversation refresh failed");
                }
            }
            SessionCommand::RefreshNotifications => {
                if let Err(e) = self.session.refresh_notifications().await {
                    debug!(error = %e, "Notification refresh failed");
                }
            }
            SessionCommand::SetVisible(visible) => {
                self.manager.set_visible(visible).await;
            }
            // Handled by the loop.
            SessionCommand::Logout | SessionCommand::Shutdown => {}
        }
    }

    /// Send `typing: false` now if a stop is pending.
    async fn stop_typing(&mut self) {
        if self.typing_idle_deadline.take().is_some() {
            self.send_typing(false).await;
        }
    }

    /// Typing frames are dropped, not queued, while the socket is down.
    async fn send_typing(&mut self, typing: bool) {
        let Some(frame) = self.session.typing_frame(typing) else {
            return;
        };
        if let Err(e) = self.manager.send(frame).await {
            debug!(typing, error = %e, "Typing signal dropped");
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
