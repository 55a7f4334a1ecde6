use std::sync::Arc;

use crate::session::config::OLD_TOKEN_LIFESPAN;
use crate::session::errors::SessionError;
use crate::session::main::store::key_prefix;
use crate::storage::CacheStore;

pub(crate) const CLAIM_PREFIX: &str = "refresh_claim";

/// Serializes concurrent refresh attempts for one session.
///
/// Provider refresh tokens are single-use: two in-flight requests holding the
/// same stale token must not both reach the provider, or the loser's call can
/// invalidate the token the winner just installed. The claim is an atomic
/// add-to-set in the backing store; the first caller to add a given refresh
/// token wins. The set is never cleared here: each rotation produces a new
/// token value to claim, and the whole set is dropped with the session.
#[derive(Clone)]
pub struct ConcurrentRefreshGuard {
    cache: Arc<dyn CacheStore>,
}

impl ConcurrentRefreshGuard {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Returns true when this caller won the claim and may perform the
    /// provider refresh; false means a concurrent refresh is already in
    /// flight with the same token.
    pub async fn claim(
        &self,
        session_key: &str,
        refresh_token: &str,
    ) -> Result<bool, SessionError> {
        // Claims older than the grace window can never matter again, so the
        // set carries a matching TTL where the store supports one.
        let ttl = (*OLD_TOKEN_LIFESPAN * 60).max(0) as usize;
        let won = self
            .cache
            .set_add(CLAIM_PREFIX, session_key, refresh_token, ttl)
            .await?;

        if !won {
            tracing::warn!(
                "Refresh token already claimed for session {}, returning retry",
                key_prefix(session_key)
            );
        }

        Ok(won)
    }
}
