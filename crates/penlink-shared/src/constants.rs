/// Application name
pub const APP_NAME: &str = "PenLink";

/// Literal heartbeat frame sent over the notification socket
pub const HEARTBEAT_FRAME: &str = "ping";

/// Literal heartbeat reply; never parsed as JSON
pub const HEARTBEAT_REPLY: &str = "pong";

/// Heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Minimum delay before reconnecting after an unexpected close
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 3_000;

/// Upper bound of the uniform jitter added to the reconnect delay
pub const DEFAULT_RECONNECT_JITTER_MS: u64 = 2_000;

/// A typing indicator clears itself after this window without a refresh
pub const DEFAULT_TYPING_WINDOW_MS: u64 = 3_000;

/// Local idle time after which a `typing: false` frame is emitted
pub const DEFAULT_TYPING_IDLE_MS: u64 = 2_000;

/// In-app toast lifetime
pub const DEFAULT_TOAST_MS: u64 = 4_000;

/// REST refresh interval of the notification inbox
pub const DEFAULT_NOTIFICATION_POLL_SECS: u64 = 30;

/// Default HTTP origin of the backend
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// REST base path
pub const API_PREFIX: &str = "/api";

/// Notification socket path prefix; the user id is appended
pub const WS_NOTIFICATIONS_PATH: &str = "/ws/notifications";

/// Key under which the bearer token is persisted
pub const SESSION_TOKEN_KEY: &str = "token";

/// Conversation preview for messages without text
pub const PHOTO_PREVIEW: &str = "📷 Photo";
pub const VOICE_PREVIEW: &str = "🎤 Voice message";
