mod config;
mod errors;
mod main;
mod types;

pub use config::{OLD_TOKEN_LIFESPAN, SESSION_COOKIE_DOMAIN, SESSION_COOKIE_NAME};
pub use errors::SessionError;
pub use main::{
    Clock, ConcurrentRefreshGuard, LoginOutcome, Refreshed, SessionStore, SystemClock,
    TokenRotationService, append_clear_session_cookie, parse_session_cookie,
    session_cookie_from_headers, sign_user_blob,
};
pub use types::{AcceptedSession, Session, SessionPatch, SessionState, TokenMatch, Validation};
