use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("value of {size} bytes exceeds the storage quota of {quota} bytes")]
    QuotaExceeded { size: usize, quota: usize },
    #[error("stored value is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("storage backend error: {0}")]
    Backend(#[from] object_store::Error),
}

/// String-valued persistent storage keyed by name.
///
/// `get` reports a missing key as `Ok(None)`; `remove` on a missing key succeeds.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
