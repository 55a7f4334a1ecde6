//! session-gate - Session and token-rotation management
//!
//! A per-user session is a pair of rotating secrets stored in an external
//! keyed store. This crate implements the session store, the
//! concurrent-refresh guard, and the login/refresh/validate/logout state
//! machine against a Keycloak-style identity provider; the `session-gate-axum`
//! crate wires it into request handling.

mod claims;
mod keycloak;
mod session;
mod storage;
mod utils;

pub use claims::{AccessClaims, ClaimsError, RefreshClaims, access_claims, refresh_claims};

pub use keycloak::{
    IdentityProvider, Introspection, KeycloakClient, KeycloakConfig, ProviderError, RealmAccess,
    TokenGrant,
};

pub use session::{
    AcceptedSession, Clock, ConcurrentRefreshGuard, LoginOutcome, OLD_TOKEN_LIFESPAN, Refreshed,
    SESSION_COOKIE_DOMAIN, SESSION_COOKIE_NAME, Session, SessionError, SessionPatch, SessionState,
    SessionStore, SystemClock, TokenMatch, TokenRotationService, Validation,
    append_clear_session_cookie, parse_session_cookie, session_cookie_from_headers, sign_user_blob,
};

pub use storage::{
    CacheData, CacheStore, InMemoryCacheStore, StorageError, StoreConfig, connect_cache_store,
};
