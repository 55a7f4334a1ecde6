use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use http::{StatusCode, request::Parts};
use serde::Serialize;

/// Authenticated end user, available as an Axum extractor on routes behind
/// [`authenticate`](crate::authenticate).
///
/// The middleware resolves the session cookie, repairs or rotates tokens as
/// needed, and stores this in the request extensions; the extractor only
/// reads it back. Using it on a route outside the middleware yields 401.
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    /// Provider subject id
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Realm roles from introspection
    pub roles: Vec<String>,
    #[serde(skip)]
    pub session_key: String,
    #[serde(skip)]
    pub provider_session: String,
    /// The access token the downstream request should carry
    #[serde(skip)]
    pub access_token: String,
}

/// Authenticated service account (bearer token with a `clientId` claim).
#[derive(Clone, Debug)]
pub struct AuthClient {
    pub client_id: String,
    pub roles: Vec<String>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}

impl<S> FromRequestParts<S> for AuthClient
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthClient>()
            .cloned()
            .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}
