//! In-memory cache store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{CacheStore, StoreError};
use crate::data::{RequestKey, StoredResponse};

/// A `CacheStore` kept in process memory
///
/// Entries live as long as the store itself. Useful for tests and for hosts
/// that do not want anything written to disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<RequestKey, StoredResponse>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.clone(), response);
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
        let mut keys: Vec<RequestKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
