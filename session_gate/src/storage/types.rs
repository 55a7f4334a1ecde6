use serde::{Deserialize, Serialize};

/// Opaque value stored in the cache store. Records serialize themselves into
/// the `value` string (JSON) before crossing this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
}
