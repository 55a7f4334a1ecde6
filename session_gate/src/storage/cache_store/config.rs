use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::errors::StorageError;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};

/// Connection parameters for the backing store, read from the environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub store_type: String,
    pub url: String,
    /// Delay between connection attempts.
    pub reconnect_period: Duration,
    /// Bounded number of initial connection attempts before giving up.
    pub connect_attempts: u32,
    /// Bounded timeout applied to connection setup and to every command.
    pub request_timeout: Duration,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, StorageError> {
        dotenvy::dotenv().ok();

        let store_type = env::var("CACHE_STORE_TYPE")
            .map_err(|_| StorageError::Config("CACHE_STORE_TYPE must be set".to_string()))?;
        let url = match store_type.as_str() {
            "memory" => env::var("CACHE_STORE_URL").unwrap_or_default(),
            _ => env::var("CACHE_STORE_URL")
                .map_err(|_| StorageError::Config("CACHE_STORE_URL must be set".to_string()))?,
        };
        let reconnect_period = env::var("CACHE_STORE_RECONNECT_PERIOD")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(5000));
        let connect_attempts = env::var("CACHE_STORE_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let request_timeout = env::var("CACHE_STORE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(5000));

        Ok(Self {
            store_type,
            url,
            reconnect_period,
            connect_attempts,
            request_timeout,
        })
    }
}

/// Construct a cache store and verify connectivity, retrying with the
/// configured backoff. The returned handle is the injected dependency every
/// other component works against.
pub async fn connect_cache_store(config: &StoreConfig) -> Result<Arc<dyn CacheStore>, StorageError> {
    let store: Arc<dyn CacheStore> = match config.store_type.as_str() {
        "memory" => Arc::new(InMemoryCacheStore::new()),
        "redis" => {
            let client = redis::Client::open(config.url.as_str())
                .map_err(|e| StorageError::Config(format!("Invalid Redis URL: {e}")))?;
            Arc::new(RedisCacheStore {
                client,
                request_timeout: config.request_timeout,
            })
        }
        t => {
            return Err(StorageError::Config(format!(
                "Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"
            )));
        }
    };

    let mut last_err = None;
    for attempt in 1..=config.connect_attempts {
        match store.init().await {
            Ok(()) => {
                tracing::info!(
                    "Connected to cache store: type={}, url={}",
                    config.store_type,
                    config.url
                );
                return Ok(store);
            }
            Err(e) => {
                tracing::error!("Cache store connect attempt {attempt} failed: {e}");
                last_err = Some(e);
                tokio::time::sleep(config.reconnect_period).await;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| StorageError::Unavailable("connect failed".to_string())))
}
