//! Shared fixtures for the crate's tests: an in-memory backed [`AuthState`]
//! and a scriptable identity provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;

use session_gate::{
    IdentityProvider, InMemoryCacheStore, Introspection, ProviderError, RealmAccess, TokenGrant,
};

use crate::AuthState;

/// Unsigned JWT-shaped token carrying the given payload.
pub fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}

pub fn make_grant(uid: &str, provider_session: &str) -> TokenGrant {
    let nonce = uuid::Uuid::new_v4().to_string();
    let access_token = make_token(&serde_json::json!({
        "sub": uid,
        "session_state": provider_session,
        "jti": nonce,
        "exp": Utc::now().timestamp() + 300,
    }));
    let refresh_token = make_token(&serde_json::json!({
        "jti": nonce,
        "exp": Utc::now().timestamp() + 1800,
    }));
    TokenGrant {
        access_token,
        refresh_token,
        expires_in: 300,
        refresh_expires_in: 1800,
        session_state: Some(provider_session.to_string()),
    }
}

pub fn make_client_token(client_id: &str) -> String {
    make_token(&serde_json::json!({
        "clientId": client_id,
        "exp": Utc::now().timestamp() + 300,
    }))
}

/// Scriptable [`IdentityProvider`]: flip the atomics to simulate inactive
/// tokens, rejected refreshes or an outage.
pub struct MockProvider {
    pub uid: String,
    pub provider_session: String,
    pub active: AtomicBool,
    pub reject_login: AtomicBool,
    pub reject_refresh: AtomicBool,
    pub unavailable: AtomicBool,
    pub introspect_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(uid: &str, provider_session: &str) -> Self {
        Self {
            uid: uid.to_string(),
            provider_session: provider_session.to_string(),
            active: AtomicBool::new(true),
            reject_login: AtomicBool::new(false),
            reject_refresh: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            introspect_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
        }
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ProviderError::Unavailable("mock outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn password_login(
        &self,
        _username: &str,
        _password: &str,
        _forwarded_for: Option<&str>,
    ) -> Result<TokenGrant, ProviderError> {
        self.check_available()?;
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected { status: 401 });
        }
        Ok(make_grant(&self.uid, &self.provider_session))
    }

    async fn introspect(&self, access_token: &str) -> Result<Introspection, ProviderError> {
        self.check_available()?;
        self.introspect_calls.fetch_add(1, Ordering::SeqCst);
        let client_id = session_gate::access_claims(access_token)
            .ok()
            .and_then(|c| c.client_id);
        Ok(Introspection {
            active: self.active.load(Ordering::SeqCst),
            sub: Some(self.uid.clone()),
            session_state: Some(self.provider_session.clone()),
            username: Some("alice".to_string()),
            client_id,
            realm_access: Some(RealmAccess {
                roles: vec!["viewer".to_string()],
            }),
        })
    }

    async fn refresh_grant(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.check_available()?;
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected { status: 400 });
        }
        Ok(make_grant(&self.uid, &self.provider_session))
    }

    async fn revoke_session(&self, _provider_session: &str) -> Result<(), ProviderError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }

    async fn health(&self) -> Result<(), ProviderError> {
        self.check_available()
    }
}

/// In-memory [`AuthState`] plus a handle to its mock provider.
pub fn test_state() -> (AuthState, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::new("user-1", "ps-1"));
    let state = AuthState::new(Arc::new(InMemoryCacheStore::new()), provider.clone());
    (state, provider)
}

/// Run a login through the rotation service and return the signed cookie
/// value a browser would present back.
pub async fn logged_in_cookie(state: &AuthState, provider: &MockProvider) -> String {
    let grant = make_grant(&provider.uid, &provider.provider_session);
    let outcome = state
        .rotation()
        .login(&grant.access_token, &grant.refresh_token)
        .await
        .unwrap();
    let set_cookie = outcome
        .headers
        .get(http::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    // "sessionId=<value>; Path=/; ..."
    let pair = set_cookie.split(';').next().unwrap();
    pair.split_once('=').unwrap().1.to_string()
}
