use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

#[derive(Debug)]
pub struct InMemoryCacheStore {
    pub(super) entry: Mutex<HashMap<String, CacheData>>,
    pub(super) sets: Mutex<HashMap<String, HashSet<String>>>,
}

#[derive(Debug)]
pub struct RedisCacheStore {
    pub(super) client: redis::Client,
    /// Bounded timeout applied to connection setup and to every command, so
    /// a hung server surfaces as `StorageError::Unavailable` instead of a
    /// request that never resolves.
    pub(super) request_timeout: Duration,
}

/// Keyed backing store for session records and refresh-claim sets.
///
/// Instances are constructed explicitly (see [`connect_cache_store`]) and
/// shared as `Arc<dyn CacheStore>`; implementations take `&self` and manage
/// their own interior synchronization.
///
/// [`connect_cache_store`]: super::config::connect_cache_store
#[async_trait]
pub trait CacheStore: std::fmt::Debug + Send + Sync + 'static {
    /// Verify the store is reachable. Called once after construction.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put a value into the store, overwriting any existing entry.
    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError>;

    /// Point lookup.
    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Remove an entry (value or set). Absent keys are a no-op.
    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError>;

    /// Atomically add `member` to the per-key set, reporting whether the
    /// member was newly added. This is the sole synchronization primitive
    /// used for refresh-race prevention. A `ttl` of 0 means no expiry.
    async fn set_add(
        &self,
        prefix: &str,
        key: &str,
        member: &str,
        ttl: usize,
    ) -> Result<bool, StorageError>;

    /// Liveness probe for health checks.
    async fn ping(&self) -> Result<(), StorageError>;
}
