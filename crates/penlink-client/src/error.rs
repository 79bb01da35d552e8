use penlink_net::NetError;
use thiserror::Error;

/// Errors produced by the client session layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// REST or socket failure.
    #[error("Network error: {0}")]
    Net(#[from] NetError),

    /// The operation needs an open conversation.
    #[error("No conversation is open")]
    NoActiveConversation,

    #[error("Message is empty")]
    EmptyMessage,

    /// The session task has stopped.
    #[error("Session closed")]
    SessionClosed,

    #[error("Could not determine application data directory")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
