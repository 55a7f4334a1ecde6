use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{self, AsyncCommands};

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, RedisCacheStore};

const CACHE_PREFIX: &str = "gate";

impl RedisCacheStore {
    fn make_key(prefix: &str, key: &str) -> String {
        format!("{CACHE_PREFIX}:{prefix}:{key}")
    }

    /// Connection with the configured response and connect timeouts, so no
    /// store call can stall a request indefinitely. Elapsed timers come back
    /// as timeout `RedisError`s and map to `StorageError::Unavailable`.
    async fn conn(&self) -> Result<MultiplexedConnection, StorageError> {
        Ok(self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                self.request_timeout,
                self.request_timeout,
            )
            .await?)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        // Verify the connection works
        let _conn = self.conn().await?;
        Ok(())
    }

    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        let mut conn = self.conn().await?;

        let key = Self::make_key(prefix, key);
        let value = serde_json::to_string(&value)?;
        let _: () = conn.set(&key, value).await?;
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let mut conn = self.conn().await?;

        let key = Self::make_key(prefix, key);
        let value: Option<String> = conn.get(&key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn().await?;

        let key = Self::make_key(prefix, key);
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn set_add(
        &self,
        prefix: &str,
        key: &str,
        member: &str,
        ttl: usize,
    ) -> Result<bool, StorageError> {
        let mut conn = self.conn().await?;

        let key = Self::make_key(prefix, key);

        // SADD reports the number of members actually added, which is the
        // atomic first-writer-wins signal the refresh guard relies on.
        let added: i64 = conn.sadd(&key, member).await?;

        if added > 0 && ttl > 0 {
            let _: () = conn.expire(&key, ttl as i64).await?;
        }

        Ok(added > 0)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
