//! Storage abstraction for the interceptor's cache

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::{RequestKey, StoredResponse};

/// Errors that can occur when accessing a cache store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing files failed
    #[error("cache store I/O failed: {0}")]
    Io(#[from] io::Error),

    /// An entry could not be encoded or decoded
    #[error("cache entry is malformed: {0}")]
    Entry(#[from] serde_json::Error),

    /// The store name cannot be used as a directory name
    #[error("invalid cache store name: {0:?}")]
    InvalidName(String),

    /// No cache directory could be determined for this platform
    #[error("no cache directory available")]
    Unavailable,
}

/// A key-value store mapping request identities to stored responses
///
/// Implementations are shared between concurrent interceptions without any
/// outer locking. Concurrent `put`s for the same key must leave exactly one
/// of the written values in place.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up the response stored under `key`
    async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StoreError>;

    /// Stores `response` under `key`, replacing any previous entry
    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StoreError>;

    /// Removes the entry under `key`, returning whether one existed
    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError>;

    /// Lists the keys of every stored entry
    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError>;
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for std::sync::Arc<T> {
    async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StoreError> {
        (**self).put(key, response).await
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        (**self).keys().await
    }
}
