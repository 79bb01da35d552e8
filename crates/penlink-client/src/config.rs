//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so the daemon starts against a local
//! backend with zero configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use penlink_net::{ConnectionConfig, ReconnectPolicy};
use penlink_shared::constants::{
    DEFAULT_BACKEND_URL, DEFAULT_HEARTBEAT_SECS, DEFAULT_NOTIFICATION_POLL_SECS,
    DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_JITTER_MS, DEFAULT_TOAST_MS,
    DEFAULT_TYPING_IDLE_MS, DEFAULT_TYPING_WINDOW_MS,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP origin of the backend; REST and socket URLs derive from it.
    /// Env: `PENLINK_BACKEND_URL`
    /// Default: `http://localhost:8001`
    pub backend_url: String,

    /// Env: `PENLINK_HEARTBEAT_SECS`
    /// Default: `30`
    pub heartbeat: Duration,

    /// Env: `PENLINK_RECONNECT_BASE_MS`
    /// Default: `3000`
    pub reconnect_base: Duration,

    /// Env: `PENLINK_RECONNECT_JITTER_MS`
    /// Default: `2000`
    pub reconnect_jitter: Duration,

    /// Env: `PENLINK_TYPING_WINDOW_MS`
    /// Default: `3000`
    pub typing_window: Duration,

    /// Local idle time before `typing: false` is sent.
    /// Env: `PENLINK_TYPING_IDLE_MS`
    /// Default: `2000`
    pub typing_idle: Duration,

    /// Env: `PENLINK_TOAST_MS`
    /// Default: `4000`
    pub toast_lifetime: Duration,

    /// Env: `PENLINK_NOTIFICATION_POLL_SECS`
    /// Default: `30`
    pub notification_poll: Duration,

    /// Where `session.json` lives.
    /// Env: `PENLINK_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Bearer token that overrides the stored one.
    /// Env: `PENLINK_TOKEN`
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_base: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            reconnect_jitter: Duration::from_millis(DEFAULT_RECONNECT_JITTER_MS),
            typing_window: Duration::from_millis(DEFAULT_TYPING_WINDOW_MS),
            typing_idle: Duration::from_millis(DEFAULT_TYPING_IDLE_MS),
            toast_lifetime: Duration::from_millis(DEFAULT_TOAST_MS),
            notification_poll: Duration::from_secs(DEFAULT_NOTIFICATION_POLL_SECS),
            data_dir: None,
            token: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; invalid values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("PENLINK_BACKEND_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                config.backend_url = url.to_string();
            } else {
                tracing::warn!(value = %url, "Invalid PENLINK_BACKEND_URL, using default");
            }
        }

        let secs = |key: &str, slot: &mut Duration| {
            if let Some(n) = parse::<u64>(&lookup, key) {
                *slot = Duration::from_secs(n);
            }
        };
        secs("PENLINK_HEARTBEAT_SECS", &mut config.heartbeat);
        secs("PENLINK_NOTIFICATION_POLL_SECS", &mut config.notification_poll);

        let millis = |key: &str, slot: &mut Duration| {
            if let Some(n) = parse::<u64>(&lookup, key) {
                *slot = Duration::from_millis(n);
            }
        };
        millis("PENLINK_RECONNECT_BASE_MS", &mut config.reconnect_base);
        millis("PENLINK_RECONNECT_JITTER_MS", &mut config.reconnect_jitter);
        millis("PENLINK_TYPING_WINDOW_MS", &mut config.typing_window);
        millis("PENLINK_TYPING_IDLE_MS", &mut config.typing_idle);
        millis("PENLINK_TOAST_MS", &mut config.toast_lifetime);

        if config.heartbeat.is_zero() {
            tracing::warn!("PENLINK_HEARTBEAT_SECS must be positive, using default");
            config.heartbeat = Duration::from_secs(DEFAULT_HEARTBEAT_SECS);
        }
        if config.notification_poll.is_zero() {
            tracing::warn!("PENLINK_NOTIFICATION_POLL_SECS must be positive, using default");
            config.notification_poll = Duration::from_secs(DEFAULT_NOTIFICATION_POLL_SECS);
        }

        if let Some(dir) = lookup("PENLINK_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(token) = lookup("PENLINK_TOKEN") {
            if !token.is_empty() {
                config.token = Some(token);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            heartbeat: self.heartbeat,
            reconnect: ReconnectPolicy::new(self.reconnect_base, self.reconnect_jitter),
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
