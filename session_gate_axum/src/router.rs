use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, extract::State, middleware::from_fn, middleware::from_fn_with_state};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::config::AUTH_ROUTE_PREFIX;
use super::context::context_id;
use super::error::IntoResponseError;
use super::middleware::authenticate;
use super::session::AuthUser;
use super::state::AuthState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Router for the auth endpoints, mounted under `AUTH_ROUTE_PREFIX`:
///
/// - `POST {prefix}/login` - password grant, issues the session cookie
/// - `GET {prefix}/status` - authenticated identity check (protected)
/// - `POST {prefix}/logout` - terminate the session (protected)
/// - `GET {prefix}/health` - store and provider liveness
pub fn auth_router(state: AuthState) -> Router {
    let protected = Router::new()
        .route("/status", get(status))
        .route("/logout", post(logout))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let routes = Router::new()
        .route("/login", post(login))
        .route("/health", get(health))
        .merge(protected)
        .layer(from_fn(context_id))
        .with_state(state);

    Router::new().nest(AUTH_ROUTE_PREFIX.as_str(), routes)
}

async fn login(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Json(credentials): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());

    tracing::info!("Login attempt for {}", credentials.username);
    let grant = state
        .provider()
        .password_login(&credentials.username, &credentials.password, forwarded_for)
        .await
        .into_response_error()?;

    let outcome = state
        .rotation()
        .login(&grant.access_token, &grant.refresh_token)
        .await
        .into_response_error()?;

    tracing::info!("User {} logged in", outcome.uid);
    Ok((outcome.headers, Json(json!({ "message": "Login success" }))))
}

/// Identity echo for authenticated callers; the interesting work (token
/// rotation, `Authorization`/`X-User` response headers) happens in the
/// middleware.
async fn status(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}

async fn logout(
    State(state): State<AuthState>,
    user: AuthUser,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let headers = state
        .rotation()
        .logout(&user.provider_session)
        .await
        .into_response_error()?;
    Ok((headers, Json(json!({ "message": "Logout success" }))))
}

async fn health(State(state): State<AuthState>) -> impl IntoResponse {
    match state.health_check().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "Unavailable")
        }
    }
}
