use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Storage(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
