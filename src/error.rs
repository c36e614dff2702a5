use thiserror::Error;

/// Errors produced by the order lifecycle core.
///
/// Every rejected transition maps to exactly one variant, and a rejected
/// transition never mutates the order or offer it was aimed at.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("invalid actor: {0}")]
    InvalidActor(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("action '{action}' does not apply to {kind} orders")]
    InvalidAction { action: String, kind: String },
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("code already consumed")]
    AlreadyConsumed,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("payment error: {0}")]
    Payment(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for OrderError {
    fn from(e: rocksdb::Error) -> Self {
        OrderError::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
