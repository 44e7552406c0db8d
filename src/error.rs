use thiserror::Error;

#[derive(Error, Debug)]
pub enum PassbookError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid transaction payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("No pending transaction with id {0}")]
    UnknownPending(i64),

    #[error("Cashback percent must be greater than zero, got {0}")]
    InvalidPercent(f64),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PassbookError>;
