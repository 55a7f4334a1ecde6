use thiserror::Error;

use crate::claims::ClaimsError;
use crate::keycloak::ProviderError;
use crate::storage::StorageError;
use crate::utils::UtilError;

/// Transport and protocol failures of the session subsystem.
///
/// The four session-logic outcomes (accepted/unknown/conflict/expired) are
/// values of [`Validation`](crate::session::Validation), not errors; only
/// genuinely exceptional conditions travel through this enum.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session-key generation kept colliding; distinct from a storage fault
    /// so callers do not retry it blindly.
    #[error("Could not allocate session key")]
    KeyAllocation,

    /// A session with this key already exists. Retryable collision, not a
    /// crash.
    #[error("Session key already exists")]
    KeyCollision,

    /// A concurrent refresh already claimed this refresh token. Retryable
    /// without re-authentication.
    #[error("Refresh already claimed for this session")]
    RefreshRaceLost,

    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Error decoding provider token claims
    #[error("Claims error: {0}")]
    Claims(#[from] ClaimsError),

    /// Error from identity-provider operations
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from backing-store operations
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl SessionError {
    /// Whether the client may retry the request as-is, without
    /// re-authenticating.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::RefreshRaceLost
                | SessionError::KeyCollision
                | SessionError::Provider(ProviderError::Unavailable(_))
        )
    }
}
