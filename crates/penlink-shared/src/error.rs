use thiserror::Error;

#[derive(Error, Debug)]
pub enum PenlinkError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
