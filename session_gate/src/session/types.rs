use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::session::errors::SessionError;
use crate::storage::CacheData;

/// A single logical login, stored in the backing store under its
/// `session_key` with a secondary index on `provider_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Primary lookup key; half of the issued cookie; never rotates.
    pub session_key: String,
    /// Current rotating secret; other half of the cookie.
    pub session_token: String,
    /// Previous session token, retained during the grace window.
    pub old_session_token: Option<String>,
    /// Moment after which `old_session_token` is no longer accepted.
    pub eol_old_session_token: Option<DateTime<Utc>>,
    pub access_token: String,
    pub refresh_token: String,
    /// Identity-provider subject.
    pub uid: String,
    /// Provider-side session id; secondary unique lookup key.
    pub provider_session: String,
    /// Refresh-token expiry, unix seconds. Drives cookie expiry.
    pub expires: i64,
}

/// Rotation/token fields written together on every refresh. The session key
/// itself is immutable.
#[derive(Debug, Clone)]
pub struct SessionPatch {
    pub session_token: String,
    pub old_session_token: Option<String>,
    pub eol_old_session_token: Option<DateTime<Utc>>,
    pub access_token: String,
    pub refresh_token: String,
    pub uid: String,
    pub provider_session: String,
    pub expires: i64,
}

/// Logical session state derived from the stored timestamps. The fourth
/// conceptual state, terminated, is represented by the record's absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Current token valid, no rotation in the recent past.
    Active,
    /// Old token still acceptable.
    Grace,
    /// Old-token window closed.
    ExpiredGrace,
}

/// Which of the stored secrets a presented token matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMatch {
    Current,
    Old,
    Neither,
}

impl Session {
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        match self.eol_old_session_token {
            None => SessionState::Active,
            Some(eol) if now <= eol => SessionState::Grace,
            Some(_) => SessionState::ExpiredGrace,
        }
    }

    /// Constant-time comparison of a presented token against the current and
    /// old secrets.
    pub fn match_token(&self, presented: &str) -> TokenMatch {
        if ct_eq(presented, &self.session_token) {
            return TokenMatch::Current;
        }
        if let Some(old) = self.old_session_token.as_deref()
            && ct_eq(presented, old)
        {
            return TokenMatch::Old;
        }
        TokenMatch::Neither
    }
}

fn ct_eq(a: &str, b: &str) -> bool {
    // Length differences short-circuit; the secrets are fixed-length so this
    // leaks nothing useful.
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Result of validating a presented cookie token against a session.
///
/// These are expected outcomes of the protocol, so they are modeled as values
/// rather than errors; `SessionError` is reserved for transport failures.
#[derive(Debug)]
pub enum Validation {
    Accepted(Box<AcceptedSession>),
    /// No record for the presented key. Client must re-authenticate.
    Unknown,
    /// Token matched neither secret but the grace window is still open.
    /// Possibly a benign race; the session is left untouched.
    Conflict,
    /// Grace window closed (or never open) for the presented token. The
    /// session has been destroyed as a side effect.
    Expired,
}

#[derive(Debug)]
pub struct AcceptedSession {
    pub uid: String,
    pub session_key: String,
    pub access_token: String,
    pub refresh_token: String,
    pub provider_session: String,
    /// Set when the client presented the old token inside the grace window:
    /// a `Set-Cookie` repairing its cookie to the current token.
    pub set_cookie: Option<HeaderMap>,
}

impl From<Session> for CacheData {
    fn from(session: Session) -> Self {
        Self {
            value: serde_json::to_string(&session).expect("Failed to serialize Session"),
        }
    }
}

impl TryFrom<CacheData> for Session {
    type Error = SessionError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value)
            .map_err(|e| SessionError::Storage(crate::storage::StorageError::Serde(e.to_string())))
    }
}
