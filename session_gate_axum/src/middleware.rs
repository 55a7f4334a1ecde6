use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use headers::Cookie;
use http::header::{AUTHORIZATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use session_gate::{
    ProviderError, SESSION_COOKIE_NAME, SessionError, Validation, access_claims,
    parse_session_cookie, sign_user_blob,
};

use super::error::{failure_response, retry_response, unauthorized_response};
use super::session::{AuthClient, AuthUser};
use super::state::AuthState;

/// Request authenticator. Mount with
/// `axum::middleware::from_fn_with_state(state, authenticate)` in front of
/// protected routes.
///
/// Bearer requests whose token carries a `clientId` claim are treated as
/// service accounts and checked by introspection alone. Everything else goes
/// through the session cookie: validate the rotating token pair, introspect
/// the stored access token, and transparently refresh it when the provider
/// reports it inactive. Successful requests get [`AuthUser`] (or
/// [`AuthClient`]) in their extensions, and the response carries the current
/// access token, a signed `X-User` blob and any repaired session cookie.
pub async fn authenticate(
    State(state): State<AuthState>,
    cookies: Option<TypedHeader<Cookie>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(bearer) = bearer_token(&req)
        && access_claims(&bearer).is_ok_and(|c| c.client_id.is_some())
    {
        return authenticate_client(&state, bearer, req, next).await;
    }

    let Some(cookie_value) = cookies
        .as_ref()
        .and_then(|c| c.get(SESSION_COOKIE_NAME.as_str()))
    else {
        tracing::debug!("No session cookie on request");
        return unauthorized_response();
    };
    let (session_key, session_token) = match parse_session_cookie(cookie_value) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("Malformed session cookie: {e}");
            return unauthorized_response();
        }
    };

    let accepted = match state.rotation().validate(&session_key, &session_token).await {
        Ok(Validation::Accepted(accepted)) => accepted,
        Ok(Validation::Unknown) | Ok(Validation::Expired) => return unauthorized_response(),
        Ok(Validation::Conflict) => return retry_response(),
        Err(e) => return failure_response(&e),
    };

    let mut extra_headers = accepted.set_cookie.unwrap_or_default();

    let introspection = match state.provider().introspect(&accepted.access_token).await {
        Ok(introspection) => introspection,
        Err(e) => return failure_response(&SessionError::Provider(e)),
    };

    let (access_token, introspection) = if introspection.active {
        (accepted.access_token, introspection)
    } else {
        // Access token lapsed; rotate the pair before letting the request
        // through.
        match state
            .rotation()
            .refresh(&accepted.session_key, &accepted.refresh_token)
            .await
        {
            Ok(refreshed) => {
                extra_headers = refreshed.headers;
                let introspection = match state.provider().introspect(&refreshed.access_token).await
                {
                    Ok(introspection) if introspection.active => introspection,
                    Ok(_) => {
                        tracing::error!("Freshly rotated access token not active");
                        return unauthorized_response();
                    }
                    Err(e) => return failure_response(&SessionError::Provider(e)),
                };
                (refreshed.access_token, introspection)
            }
            Err(SessionError::RefreshRaceLost) => return retry_response(),
            Err(SessionError::Provider(ProviderError::Rejected { status })) => {
                // The refresh token is dead at the provider. The session
                // cannot recover; destroy it.
                tracing::error!("Refresh rejected with status {status}, terminating session");
                if let Err(e) = state.rotation().terminate_by_key(&accepted.session_key).await {
                    tracing::error!("Failed to terminate session after rejected refresh: {e}");
                }
                return unauthorized_response();
            }
            Err(e) => return failure_response(&e),
        }
    };

    let user = AuthUser {
        uid: accepted.uid,
        username: introspection.username.clone(),
        roles: introspection.roles().to_vec(),
        session_key: accepted.session_key,
        provider_session: accepted.provider_session,
        access_token: access_token.clone(),
    };
    req.extensions_mut().insert(user.clone());

    let mut response = next.run(req).await;
    apply_identity_headers(&mut response, &user, &access_token);
    merge_set_cookies(&mut response, extra_headers);
    response
}

/// Service-account branch: no session, no cookie, introspection decides.
async fn authenticate_client(
    state: &AuthState,
    bearer: String,
    mut req: Request,
    next: Next,
) -> Response {
    let introspection = match state.provider().introspect(&bearer).await {
        Ok(introspection) => introspection,
        Err(e) => return failure_response(&SessionError::Provider(e)),
    };
    if !introspection.active {
        tracing::error!("Inactive service-account token");
        return unauthorized_response();
    }
    let Some(client_id) = introspection.client_id else {
        tracing::error!("Active bearer token lost its clientId on introspection");
        return unauthorized_response();
    };

    tracing::debug!("Authenticated service account {client_id}");
    req.extensions_mut().insert(AuthClient {
        client_id,
        roles: introspection
            .realm_access
            .map(|r| r.roles)
            .unwrap_or_default(),
    });
    let mut response = next.run(req).await;
    match HeaderValue::from_str(&bearer) {
        Ok(value) => {
            response.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(e) => tracing::error!("Bearer token not a valid header value: {e}"),
    }
    response
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Mirror the current access token and a signed identity blob onto the
/// response, for upstream proxies that forward them to the application.
fn apply_identity_headers(response: &mut Response, user: &AuthUser, access_token: &str) {
    match HeaderValue::from_str(access_token) {
        Ok(value) => {
            response.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(e) => tracing::error!("Access token not a valid header value: {e}"),
    }
    match sign_user_blob(user).and_then(|blob| {
        HeaderValue::from_str(&blob).map_err(|e| SessionError::Cookie(e.to_string()))
    }) {
        Ok(value) => {
            response.headers_mut().insert("X-User", value);
        }
        Err(e) => tracing::error!("Failed to build X-User header: {e}"),
    }
}

fn merge_set_cookies(response: &mut Response, headers: HeaderMap) {
    for value in headers.get_all(SET_COOKIE) {
        response.headers_mut().append(SET_COOKIE, value.clone());
    }
}
