use penlink_shared::PenlinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("No session token")]
    MissingToken,

    #[error("Notification socket is not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    Protocol(#[from] PenlinkError),
}

impl NetError {
    /// Whether the backend rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, NetError::Http { status: 401, .. } | NetError::MissingToken)
    }
}
