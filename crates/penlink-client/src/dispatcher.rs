//! Turns pushed events into transient user-visible cues: an in-app toast
//! and, when the runtime allows it, a mirrored OS notification.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use penlink_shared::constants::DEFAULT_TOAST_MS;
use penlink_shared::models::{Message, MessageKind, Notification, NotificationKind};
use penlink_shared::types::ConversationId;

/// Where a click on a cue navigates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Profile { username: String },
    Blog { post_id: String },
    /// Short posts open the social feed.
    Feed,
    Conversation { id: ConversationId },
}

impl Route {
    /// Click-through target of an activity notification.
    pub fn for_notification(n: &Notification) -> Option<Self> {
        if let Some(post_id) = &n.post_id {
            return Some(if n.targets_blog() {
                Route::Blog {
                    post_id: post_id.clone(),
                }
            } else {
                Route::Feed
            });
        }
        (n.kind == NotificationKind::Follow).then(|| Route::Profile {
            username: n.actor_username.clone(),
        })
    }

    pub fn path(&self) -> String {
        match self {
            Route::Profile { username } => format!("/profile/{username}"),
            Route::Blog { post_id } => format!("/blog/{post_id}"),
            Route::Feed => "/social".to_string(),
            Route::Conversation { id } => format!("/messages?conversation={id}"),
        }
    }
}

pub fn notification_icon(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Follow => "👤",
        NotificationKind::Like => "❤️",
        NotificationKind::Comment => "💬",
        NotificationKind::Reply => "↩️",
        NotificationKind::Other => "🔔",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

/// An in-app transient cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub icon: &'static str,
    pub title: String,
    pub description: Option<String>,
    pub lifetime: Duration,
    pub action: Option<Route>,
}

impl Toast {
    pub fn headline(&self) -> String {
        format!("{} {}", self.icon, self.title)
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Renders in-app toasts.
pub trait ToastSink: Send {
    fn show(&mut self, toast: Toast);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Unsupported,
}

/// An OS-level notification. It dismisses itself after `lifetime`; a click
/// focuses the client and follows `route`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    pub lifetime: Duration,
    pub route: Option<Route>,
}

#[derive(Error, Debug)]
pub enum DesktopError {
    #[error("Notification permission not granted")]
    PermissionDenied,

    #[error("Notifications unsupported: {0}")]
    Unsupported(String),
}

/// OS notification backend.
pub trait DesktopNotifier: Send {
    /// Permission previously granted by the user; never prompts.
    fn permission(&self) -> Permission;

    fn notify(&mut self, notification: &DesktopNotification) -> Result<(), DesktopError>;
}

/// Backend for runtimes without OS notifications.
#[derive(Debug, Default)]
pub struct NoDesktop;

impl DesktopNotifier for NoDesktop {
    fn permission(&self) -> Permission {
        Permission::Unsupported
    }

    fn notify(&mut self, _: &DesktopNotification) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("no desktop backend".into()))
    }
}

/// Writes toasts to the log; used by the headless daemon.
#[derive(Debug, Default)]
pub struct TracingToasts;

impl ToastSink for TracingToasts {
    fn show(&mut self, toast: Toast) {
        let route = toast.action.as_ref().map(Route::path);
        match toast.level {
            ToastLevel::Info => info!(
                title = %toast.headline(),
                description = toast.description.as_deref().unwrap_or(""),
                route = route.as_deref().unwrap_or(""),
                "Toast"
            ),
            ToastLevel::Error => warn!(title = %toast.headline(), "Toast"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    toasts: Box<dyn ToastSink>,
    desktop: Box<dyn DesktopNotifier>,
    lifetime: Duration,
}

impl Dispatcher {
    pub fn new(
        toasts: Box<dyn ToastSink>,
        desktop: Box<dyn DesktopNotifier>,
        lifetime: Duration,
    ) -> Self {
        Self {
            toasts,
            desktop,
            lifetime,
        }
    }

    /// Log-only dispatcher.
    pub fn headless() -> Self {
        Self::new(
            Box::new(TracingToasts),
            Box::new(NoDesktop),
            Duration::from_millis(DEFAULT_TOAST_MS),
        )
    }

    /// Cue for an activity notification.
    pub fn notification(&mut self, n: &Notification) {
        let toast = Toast {
            level: ToastLevel::Info,
            icon: notification_icon(n.kind),
            title: n.actor_username.clone(),
            description: Some(n.message.clone()),
            lifetime: self.lifetime,
            action: Route::for_notification(n),
        };
        self.show(toast, true);
    }

    /// Cue for a chat message that arrived outside the open conversation.
    pub fn message(&mut self, m: &Message) {
        let description = if !m.content.is_empty() {
            m.content.clone()
        } else if m.kind == MessageKind::Voice {
            "🎤 Sent a voice message".to_string()
        } else {
            "📷 Sent a photo".to_string()
        };

        let toast = Toast {
            level: ToastLevel::Info,
            icon: "💬",
            title: m.sender_username.clone(),
            description: Some(description),
            lifetime: self.lifetime,
            action: Some(Route::Conversation {
                id: m.conversation_id.clone(),
            }),
        };
        self.show(toast, true);
    }

    /// In-app only cue for a failed action, e.g. `"Failed to send message"`.
    pub fn error(&mut self, text: impl Into<String>) {
        let toast = Toast {
            level: ToastLevel::Error,
            icon: "❌",
            title: text.into(),
            description: None,
            lifetime: self.lifetime,
            action: None,
        };
        self.show(toast, false);
    }

    fn show(&mut self, toast: Toast, mirror: bool) {
        if mirror && self.desktop.permission() == Permission::Granted {
            let desktop = DesktopNotification {
                title: toast.headline(),
                body: toast.description.clone().unwrap_or_default(),
                lifetime: toast.lifetime,
                route: toast.action.clone(),
            };
            if let Err(e) = self.desktop.notify(&desktop) {
                debug!(error = %e, "OS notification failed; toast only");
            }
        }
        self.toasts.show(toast);
    }
}
