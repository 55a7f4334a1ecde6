use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, InMemoryCacheStore};

const CACHE_PREFIX: &str = "gate";

impl InMemoryCacheStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory cache store");
        Self {
            entry: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
        }
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{CACHE_PREFIX}:{prefix}:{key}")
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.lock().await.insert(key, value);
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let key = Self::make_key(prefix, key);
        Ok(self.entry.lock().await.get(&key).cloned())
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.lock().await.remove(&key);
        self.sets.lock().await.remove(&key);
        Ok(())
    }

    async fn set_add(
        &self,
        prefix: &str,
        key: &str,
        member: &str,
        _ttl: usize,
    ) -> Result<bool, StorageError> {
        let key = Self::make_key(prefix, key);
        // The whole add-if-absent is under one lock, so two racing callers
        // observe a consistent first-writer-wins outcome.
        let mut sets = self.sets.lock().await;
        Ok(sets.entry(key).or_default().insert(member.to_string()))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
