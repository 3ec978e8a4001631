use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("channel is not open")]
    NotOpen,
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("invalid channel address: {0}")]
    InvalidAddress(String),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("directory request failed: {0}")]
    Directory(#[from] reqwest::Error),
}
