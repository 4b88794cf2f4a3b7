use thiserror::Error;

use crate::storage::kv::StoreError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Key-value store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Remote source unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
