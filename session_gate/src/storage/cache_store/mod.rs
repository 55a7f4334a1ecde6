mod config;
mod memory;
mod redis;
mod types;

pub use config::{StoreConfig, connect_cache_store};
pub use types::{CacheStore, InMemoryCacheStore};
