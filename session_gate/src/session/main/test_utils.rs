//! Shared fixtures for session tests: an in-memory store handle, canned
//! provider grants, a mock identity provider with call counters and a fixed
//! clock.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::claims::test_jwt::make_token;
use crate::keycloak::{IdentityProvider, Introspection, ProviderError, RealmAccess, TokenGrant};
use crate::session::main::rotation::Clock;
use crate::session::types::Session;
use crate::storage::{CacheData, CacheStore, InMemoryCacheStore, StorageError};
use crate::utils::gen_secret_hex;

pub(crate) fn memory_store() -> Arc<dyn CacheStore> {
    Arc::new(InMemoryCacheStore::new())
}

pub(crate) fn make_session(uid: &str, provider_session: &str) -> Session {
    Session {
        session_key: gen_secret_hex(512).unwrap(),
        session_token: gen_secret_hex(512).unwrap(),
        old_session_token: None,
        eol_old_session_token: None,
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        uid: uid.to_string(),
        provider_session: provider_session.to_string(),
        expires: Utc::now().timestamp() + 1800,
    }
}

/// Token pair with decodable claims, unique per call.
pub(crate) fn make_grant(uid: &str, provider_session: &str, refresh_exp: i64) -> TokenGrant {
    let nonce = gen_secret_hex(8).unwrap();
    let access_token = make_token(&serde_json::json!({
        "sub": uid,
        "session_state": provider_session,
        "jti": nonce,
    }));
    let refresh_token = make_token(&serde_json::json!({
        "exp": refresh_exp,
        "jti": nonce,
    }));
    TokenGrant {
        access_token,
        refresh_token,
        expires_in: 300,
        refresh_expires_in: refresh_exp - Utc::now().timestamp(),
        session_state: Some(provider_session.to_string()),
    }
}

/// Identity provider double: counts calls, can be told to report an inactive
/// token or to fail refresh/revoke.
pub(crate) struct MockProvider {
    active: AtomicBool,
    fail_refresh: AtomicBool,
    fail_revoke: AtomicBool,
    refresh_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    introspect_calls: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            fail_refresh: AtomicBool::new(false),
            fail_revoke: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            introspect_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub(crate) fn fail_refresh(&self) {
        self.fail_refresh.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_revoke(&self) {
        self.fail_revoke.store(true, Ordering::SeqCst);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub(crate) fn introspect_calls(&self) -> usize {
        self.introspect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn password_login(
        &self,
        username: &str,
        _password: &str,
        _forwarded_for: Option<&str>,
    ) -> Result<TokenGrant, ProviderError> {
        Ok(make_grant(
            &format!("uid-{username}"),
            "ps-1",
            Utc::now().timestamp() + 1800,
        ))
    }

    async fn introspect(&self, _access_token: &str) -> Result<Introspection, ProviderError> {
        self.introspect_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.load(Ordering::SeqCst);
        Ok(Introspection {
            active,
            sub: active.then(|| "uid-1".to_string()),
            session_state: active.then(|| "ps-1".to_string()),
            username: active.then(|| "alice".to_string()),
            client_id: None,
            realm_access: active.then(|| RealmAccess {
                roles: vec!["buyer".to_string()],
            }),
        })
    }

    async fn refresh_grant(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected { status: 400 });
        }
        Ok(make_grant("uid-1", "ps-1", Utc::now().timestamp() + 1800))
    }

    async fn revoke_session(&self, _provider_session: &str) -> Result<(), ProviderError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("revoke refused".to_string()));
        }
        Ok(())
    }

    async fn health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Controllable time source for grace-window tests.
pub(crate) struct FixedClock(StdMutex<DateTime<Utc>>);

impl FixedClock {
    pub(crate) fn new() -> Self {
        Self(StdMutex::new(Utc::now()))
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// A store where every key already holds a session, to exercise the bounded
/// session-key allocation.
#[derive(Debug)]
pub(crate) struct SaturatedStore {
    canned: CacheData,
}

impl SaturatedStore {
    pub(crate) fn new() -> Self {
        Self {
            canned: make_session("uid-existing", "ps-existing").into(),
        }
    }
}

#[async_trait]
impl CacheStore for SaturatedStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&self, _: &str, _: &str, _: CacheData) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get(&self, _: &str, _: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(Some(self.canned.clone()))
    }

    async fn remove(&self, _: &str, _: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn set_add(&self, _: &str, _: &str, _: &str, _: usize) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
