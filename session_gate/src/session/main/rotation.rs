use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;

use crate::claims::{ClaimsError, access_claims, refresh_claims};
use crate::keycloak::IdentityProvider;
use crate::session::config::{OLD_TOKEN_LIFESPAN, SESSION_KEY_ATTEMPTS, SESSION_SECRET_BYTES};
use crate::session::errors::SessionError;
use crate::session::main::cookie::{append_clear_session_cookie, append_session_cookie};
use crate::session::main::guard::ConcurrentRefreshGuard;
use crate::session::main::store::{SessionStore, key_prefix};
use crate::session::types::{
    AcceptedSession, Session, SessionPatch, SessionState, TokenMatch, Validation,
};
use crate::storage::{CacheStore, StorageError};
use crate::utils::gen_secret_hex;

/// Injectable time source so grace-window logic is testable without real
/// clocks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Result of a successful login: the allocated session key and the
/// `Set-Cookie` headers to send to the client.
#[derive(Debug)]
pub struct LoginOutcome {
    pub session_key: String,
    pub uid: String,
    pub headers: HeaderMap,
}

/// Result of a successful refresh.
#[derive(Debug)]
pub struct Refreshed {
    pub session_token: String,
    pub access_token: String,
    pub headers: HeaderMap,
}

/// The session state machine: login creates, refresh rotates under the
/// concurrent-refresh guard, validate applies the grace-window comparison,
/// logout deletes locally and revokes remotely.
pub struct TokenRotationService {
    store: SessionStore,
    guard: ConcurrentRefreshGuard,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
}

impl TokenRotationService {
    pub fn new(cache: Arc<dyn CacheStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_clock(cache, provider, Arc::new(SystemClock))
    }

    pub fn with_clock(
        cache: Arc<dyn CacheStore>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: SessionStore::new(cache.clone()),
            guard: ConcurrentRefreshGuard::new(cache),
            provider,
            clock,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn grace_period(&self) -> Duration {
        Duration::minutes(*OLD_TOKEN_LIFESPAN)
    }

    /// Generate a fresh, unused session key, bounded to a handful of
    /// attempts so pathological collision rates fail loudly instead of
    /// looping.
    async fn allocate_session_key(&self) -> Result<String, SessionError> {
        for _ in 0..SESSION_KEY_ATTEMPTS {
            let key = gen_secret_hex(SESSION_SECRET_BYTES)?;
            if self.store.find_by_key(&key).await?.is_none() {
                return Ok(key);
            }
            tracing::warn!("Session key collision, regenerating");
        }
        Err(SessionError::KeyAllocation)
    }

    /// Create a session from a freshly issued token pair and produce the
    /// two-part cookie.
    pub async fn login(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<LoginOutcome, SessionError> {
        let claims = access_claims(access_token)?;
        let uid = claims
            .sub
            .ok_or_else(|| ClaimsError::Malformed("access token missing sub".to_string()))?;
        let provider_session = claims.session_state.ok_or_else(|| {
            ClaimsError::Malformed("access token missing session_state".to_string())
        })?;
        let expires = refresh_claims(refresh_token)?.exp;

        let session_key = self.allocate_session_key().await?;
        let session_token = gen_secret_hex(SESSION_SECRET_BYTES)?;

        let session = Session {
            session_key: session_key.clone(),
            session_token: session_token.clone(),
            old_session_token: None,
            eol_old_session_token: None,
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            uid: uid.clone(),
            provider_session,
            expires,
        };
        self.store.create(&session).await?;

        tracing::info!("Created session {} for user", key_prefix(&session_key));

        let mut headers = HeaderMap::new();
        append_session_cookie(
            &mut headers,
            &session_key,
            &session_token,
            expires,
            self.clock.now(),
        )?;

        Ok(LoginOutcome {
            session_key,
            uid,
            headers,
        })
    }

    /// Rotate the session's tokens. Exactly one of any set of concurrent
    /// callers presenting the same refresh token performs the provider call;
    /// losers get [`SessionError::RefreshRaceLost`] and must not retry with
    /// the provider themselves.
    pub async fn refresh(
        &self,
        session_key: &str,
        refresh_token: &str,
    ) -> Result<Refreshed, SessionError> {
        if !self.guard.claim(session_key, refresh_token).await? {
            return Err(SessionError::RefreshRaceLost);
        }

        let Some(session) = self.store.find_by_key(session_key).await? else {
            return Err(SessionError::Storage(StorageError::Storage(
                "Session disappeared during refresh".to_string(),
            )));
        };

        let grant = self.provider.refresh_grant(refresh_token).await?;

        let now = self.clock.now();
        let expires = refresh_claims(&grant.refresh_token)
            .map(|c| c.exp)
            .unwrap_or_else(|_| now.timestamp() + grant.refresh_expires_in);
        let provider_session = access_claims(&grant.access_token)
            .ok()
            .and_then(|c| c.session_state)
            .unwrap_or_else(|| session.provider_session.clone());

        let new_session_token = gen_secret_hex(SESSION_SECRET_BYTES)?;
        let patch = SessionPatch {
            session_token: new_session_token.clone(),
            old_session_token: Some(session.session_token),
            eol_old_session_token: Some(now + self.grace_period()),
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token,
            uid: session.uid,
            provider_session,
            expires,
        };
        self.store.update(session_key, patch).await?;

        tracing::info!("Rotated tokens for session {}", key_prefix(session_key));

        let mut headers = HeaderMap::new();
        append_session_cookie(&mut headers, session_key, &new_session_token, expires, now)?;

        Ok(Refreshed {
            session_token: new_session_token,
            access_token: grant.access_token,
            headers,
        })
    }

    /// Grace-window tolerant comparison of a presented cookie token.
    ///
    /// The four protocol outcomes come back as [`Validation`] values; only
    /// transport failures are errors. An old token inside its window is
    /// accepted and the response carries a cookie repaired to the current
    /// token. Expired and never-matching tokens destroy the session.
    pub async fn validate(
        &self,
        session_key: &str,
        presented_token: &str,
    ) -> Result<Validation, SessionError> {
        let Some(session) = self.store.find_by_key(session_key).await? else {
            tracing::error!("Unknown session {}", key_prefix(session_key));
            return Ok(Validation::Unknown);
        };

        let now = self.clock.now();
        let state = session.state(now);

        match (session.match_token(presented_token), state) {
            (TokenMatch::Current, _) => Ok(Validation::Accepted(Box::new(AcceptedSession {
                uid: session.uid,
                session_key: session.session_key,
                access_token: session.access_token,
                refresh_token: session.refresh_token,
                provider_session: session.provider_session,
                set_cookie: None,
            }))),
            (TokenMatch::Old, SessionState::Grace) => {
                tracing::info!(
                    "Session {} presented old token inside grace window",
                    key_prefix(session_key)
                );
                let mut headers = HeaderMap::new();
                append_session_cookie(
                    &mut headers,
                    session_key,
                    &session.session_token,
                    session.expires,
                    now,
                )?;
                Ok(Validation::Accepted(Box::new(AcceptedSession {
                    uid: session.uid,
                    session_key: session.session_key,
                    access_token: session.access_token,
                    refresh_token: session.refresh_token,
                    provider_session: session.provider_session,
                    set_cookie: Some(headers),
                })))
            }
            (TokenMatch::Neither, SessionState::Grace) => {
                // Ambiguous: either a replay or a client that has not yet
                // received the newest cookie. Neither accepted nor destroyed.
                tracing::error!(
                    "Conflicting token for session {}",
                    key_prefix(session_key)
                );
                Ok(Validation::Conflict)
            }
            (TokenMatch::Old, _) | (TokenMatch::Neither, _) => {
                tracing::error!(
                    "Expired or unknown token for session {}, destroying session",
                    key_prefix(session_key)
                );
                self.store.delete(session_key).await?;
                Ok(Validation::Expired)
            }
        }
    }

    /// Terminate a session by its provider-side session id (remote-initiated
    /// logout). Local deletion is unconditional; a failed provider revoke is
    /// logged and does not fail the logout.
    pub async fn logout(&self, provider_session: &str) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();
        append_clear_session_cookie(&mut headers)?;

        let Some(session) = self.store.find_by_provider_session(provider_session).await? else {
            tracing::info!("Logout for unknown provider session, nothing to do");
            return Ok(headers);
        };

        if let Err(e) = self.provider.revoke_session(provider_session).await {
            tracing::warn!("Provider session revoke failed, deleting locally anyway: {e}");
        }
        self.store.delete(&session.session_key).await?;

        tracing::info!("Logged out session {}", key_prefix(&session.session_key));
        Ok(headers)
    }

    /// Destroy a session by its primary key, revoking the provider side on a
    /// best-effort basis. Used when a refresh is rejected outright.
    pub async fn terminate_by_key(&self, session_key: &str) -> Result<(), SessionError> {
        if let Some(session) = self.store.find_by_key(session_key).await?
            && let Err(e) = self.provider.revoke_session(&session.provider_session).await
        {
            tracing::warn!("Provider session revoke failed during terminate: {e}");
        }
        self.store.delete(session_key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::main::test_utils::{
        FixedClock, MockProvider, SaturatedStore, make_grant, memory_store,
    };
    use http::header::SET_COOKIE;

    fn service(
        cache: Arc<dyn CacheStore>,
        provider: Arc<MockProvider>,
        clock: Arc<FixedClock>,
    ) -> TokenRotationService {
        TokenRotationService::with_clock(cache, provider, clock)
    }

    #[tokio::test]
    async fn test_login_then_validate_returns_uid() {
        let cache = memory_store();
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(FixedClock::new());
        let svc = service(cache, provider, clock);

        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        let outcome = svc.login(&grant.access_token, &grant.refresh_token).await.unwrap();
        assert!(outcome.headers.contains_key(SET_COOKIE));

        let session = svc.store().find_by_key(&outcome.session_key).await.unwrap().unwrap();
        match svc.validate(&outcome.session_key, &session.session_token).await.unwrap() {
            Validation::Accepted(accepted) => {
                assert_eq!(accepted.uid, "uid-1");
                assert_eq!(accepted.provider_session, "ps-1");
                assert!(accepted.set_cookie.is_none());
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_unknown_key() {
        let svc = service(
            memory_store(),
            Arc::new(MockProvider::new()),
            Arc::new(FixedClock::new()),
        );
        let result = svc.validate("nonexistent-key", "token").await.unwrap();
        assert!(matches!(result, Validation::Unknown));
    }

    #[tokio::test]
    async fn test_login_tokens_without_sub_rejected() {
        let svc = service(
            memory_store(),
            Arc::new(MockProvider::new()),
            Arc::new(FixedClock::new()),
        );
        let token = crate::claims::test_jwt::make_token(&serde_json::json!({
            "session_state": "ps-1"
        }));
        let refresh = crate::claims::test_jwt::make_token(&serde_json::json!({"exp": 1}));
        let err = svc.login(&token, &refresh).await.unwrap_err();
        assert!(matches!(err, SessionError::Claims(_)));
    }

    #[tokio::test]
    async fn test_key_allocation_is_bounded() {
        // A store where every key already exists exhausts the attempt budget.
        let svc = service(
            Arc::new(SaturatedStore::new()),
            Arc::new(MockProvider::new()),
            Arc::new(FixedClock::new()),
        );
        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        let err = svc.login(&grant.access_token, &grant.refresh_token).await.unwrap_err();
        assert!(matches!(err, SessionError::KeyAllocation));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_keeps_old_token() {
        let cache = memory_store();
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(FixedClock::new());
        let svc = service(cache, provider.clone(), clock.clone());

        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        let outcome = svc.login(&grant.access_token, &grant.refresh_token).await.unwrap();
        let before = svc.store().find_by_key(&outcome.session_key).await.unwrap().unwrap();

        let refreshed = svc
            .refresh(&outcome.session_key, &before.refresh_token)
            .await
            .unwrap();
        assert_ne!(refreshed.session_token, before.session_token);
        assert!(refreshed.headers.contains_key(SET_COOKIE));
        assert_eq!(provider.refresh_calls(), 1);

        let after = svc.store().find_by_key(&outcome.session_key).await.unwrap().unwrap();
        assert_eq!(after.session_token, refreshed.session_token);
        assert_eq!(after.old_session_token.as_deref(), Some(before.session_token.as_str()));
        assert!(after.eol_old_session_token.is_some());
        // Access/refresh tokens rotated together with the session token.
        assert_ne!(after.access_token, before.access_token);
        assert_ne!(after.refresh_token, before.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_race_single_winner() {
        let cache = memory_store();
        let provider = Arc::new(MockProvider::new());
        let clock = Arc::new(FixedClock::new());
        let svc = Arc::new(service(cache, provider.clone(), clock));

        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        let outcome = svc.login(&grant.access_token, &grant.refresh_token).await.unwrap();
        let session = svc.store().find_by_key(&outcome.session_key).await.unwrap().unwrap();

        let (a, b) = tokio::join!(
            svc.refresh(&outcome.session_key, &session.refresh_token),
            svc.refresh(&outcome.session_key, &session.refresh_token),
        );

        let outcomes = [a, b];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        let losers = outcomes
            .iter()
            .filter(|r| matches!(r, Err(SessionError::RefreshRaceLost)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(losers, 1);
        // The loser never reached the provider.
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_provider_rejection_propagates() {
        let cache = memory_store();
        let provider = Arc::new(MockProvider::new());
        provider.fail_refresh();
        let svc = service(cache, provider, Arc::new(FixedClock::new()));

        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        let outcome = svc.login(&grant.access_token, &grant.refresh_token).await.unwrap();
        let session = svc.store().find_by_key(&outcome.session_key).await.unwrap().unwrap();

        let err = svc
            .refresh(&outcome.session_key, &session.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Provider(_)));
    }

    #[tokio::test]
    async fn test_logout_deletes_even_when_revoke_fails() {
        let cache = memory_store();
        let provider = Arc::new(MockProvider::new());
        provider.fail_revoke();
        let svc = service(cache, provider.clone(), Arc::new(FixedClock::new()));

        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        let outcome = svc.login(&grant.access_token, &grant.refresh_token).await.unwrap();

        let headers = svc.logout("ps-1").await.unwrap();
        assert!(headers.contains_key(SET_COOKIE));
        assert_eq!(provider.revoke_calls(), 1);
        assert!(svc.store().find_by_key(&outcome.session_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_twice_does_not_error() {
        let cache = memory_store();
        let provider = Arc::new(MockProvider::new());
        let svc = service(cache, provider.clone(), Arc::new(FixedClock::new()));

        let grant = make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800);
        svc.login(&grant.access_token, &grant.refresh_token).await.unwrap();

        svc.logout("ps-1").await.unwrap();
        svc.logout("ps-1").await.unwrap();
        // Second call found nothing and never called the provider again.
        assert_eq!(provider.revoke_calls(), 1);
    }
}
