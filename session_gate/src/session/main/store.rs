use std::sync::Arc;

use crate::session::errors::SessionError;
use crate::session::types::{Session, SessionPatch};
use crate::storage::{CacheData, CacheStore};

const SESSION_PREFIX: &str = "session";
const PROVIDER_PREFIX: &str = "provider_session";

/// Durable, indexed storage for [`Session`] records over the generic cache
/// store. Both unique keys are point lookups: the record lives under the
/// session key, and a small index entry under the provider session id maps
/// back to it.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn CacheStore>,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Insert a new record. The caller guarantees key uniqueness (checked via
    /// [`find_by_key`](Self::find_by_key) before generation); a collision
    /// here is reported loudly as a retryable error.
    pub async fn create(&self, session: &Session) -> Result<(), SessionError> {
        if self.find_by_key(&session.session_key).await?.is_some() {
            return Err(SessionError::KeyCollision);
        }

        self.cache
            .put(
                PROVIDER_PREFIX,
                &session.provider_session,
                CacheData {
                    value: session.session_key.clone(),
                },
            )
            .await?;
        self.cache
            .put(SESSION_PREFIX, &session.session_key, session.clone().into())
            .await?;
        Ok(())
    }

    pub async fn find_by_key(&self, session_key: &str) -> Result<Option<Session>, SessionError> {
        match self.cache.get(SESSION_PREFIX, session_key).await? {
            Some(data) => Ok(Some(data.try_into()?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_provider_session(
        &self,
        provider_session: &str,
    ) -> Result<Option<Session>, SessionError> {
        let Some(index) = self.cache.get(PROVIDER_PREFIX, provider_session).await? else {
            return Ok(None);
        };
        self.find_by_key(&index.value).await
    }

    /// Apply a rotation patch to the record identified by `session_key`. The
    /// record itself is rewritten in a single store write; the provider index
    /// is moved separately when the provider session id changed.
    pub async fn update(&self, session_key: &str, patch: SessionPatch) -> Result<Session, SessionError> {
        let Some(current) = self.find_by_key(session_key).await? else {
            return Err(SessionError::Storage(crate::storage::StorageError::Storage(
                format!("Cannot update missing session (key prefix {})", key_prefix(session_key)),
            )));
        };

        let updated = Session {
            session_key: current.session_key.clone(),
            session_token: patch.session_token,
            old_session_token: patch.old_session_token,
            eol_old_session_token: patch.eol_old_session_token,
            access_token: patch.access_token,
            refresh_token: patch.refresh_token,
            uid: patch.uid,
            provider_session: patch.provider_session,
            expires: patch.expires,
        };

        if updated.provider_session != current.provider_session {
            self.cache
                .remove(PROVIDER_PREFIX, &current.provider_session)
                .await?;
            self.cache
                .put(
                    PROVIDER_PREFIX,
                    &updated.provider_session,
                    CacheData {
                        value: updated.session_key.clone(),
                    },
                )
                .await?;
        }

        self.cache
            .put(SESSION_PREFIX, session_key, updated.clone().into())
            .await?;
        Ok(updated)
    }

    /// Idempotent removal: the record, its provider index entry and its
    /// refresh-claim set are all dropped; absent keys are a no-op.
    pub async fn delete(&self, session_key: &str) -> Result<(), SessionError> {
        if let Some(session) = self.find_by_key(session_key).await? {
            self.cache
                .remove(PROVIDER_PREFIX, &session.provider_session)
                .await?;
        }
        self.cache.remove(SESSION_PREFIX, session_key).await?;
        self.cache
            .remove(super::guard::CLAIM_PREFIX, session_key)
            .await?;
        Ok(())
    }
}

/// Short, loggable prefix of a session key. Full keys never appear in logs
/// or error messages.
pub(crate) fn key_prefix(session_key: &str) -> &str {
    &session_key[..session_key.len().min(8)]
}
