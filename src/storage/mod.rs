use async_trait::async_trait;
use thiserror::Error;

pub mod asset_store;
pub mod driver;
pub mod keys;
pub mod owner_storage;

/// Failure surfaced by an object store backend.
///
/// Transient failures (network, timeout, 5xx) are retried a bounded number
/// of times inside the driver before they reach a caller; permanent
/// failures (auth, 4xx) abort the running operation immediately.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transient object store failure during {op}: {message}")]
    Transient { op: &'static str, message: String },

    #[error("permanent object store failure during {op}: {message}")]
    Permanent { op: &'static str, message: String },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key` and returns the object's public URL.
    async fn put(&self, key: &str, data: &[u8]) -> Result<String, StoreError>;

    /// Copies the object at `src_key` to `dst_key`.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError>;

    /// Deletes the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Public URL an object stored under `key` is reachable at.
    fn url_for(&self, key: &str) -> String;
}
