use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use serde_json::json;

use session_gate::{ProviderError, SessionError, append_clear_session_cookie};

/// 401 with the session cookie cleared. The client must authenticate again.
pub(super) fn unauthorized_response() -> Response {
    let mut headers = HeaderMap::new();
    if let Err(e) = append_clear_session_cookie(&mut headers) {
        tracing::error!("Failed to build clear-cookie header: {e}");
    }
    (
        StatusCode::UNAUTHORIZED,
        headers,
        Json(json!({ "message": "Authentication failed" })),
    )
        .into_response()
}

/// 403 with `X-Retry: true` and no `Set-Cookie`: the request lost a benign
/// race and may be replayed as-is.
pub(super) fn retry_response() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("X-Retry", http::HeaderValue::from_static("true"));
    (
        StatusCode::FORBIDDEN,
        headers,
        Json(json!({ "message": "Concurrent request, retry" })),
    )
        .into_response()
}

/// Transport failures. Provider outages are surfaced as 502 so callers can
/// distinguish them from our own faults.
pub(super) fn failure_response(err: &SessionError) -> Response {
    tracing::error!("Authentication transport failure: {err}");
    let status = match err {
        SessionError::Provider(ProviderError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "message": "Authentication unavailable" }))).into_response()
}

/// Helper trait for converting handler errors to a standard response error
/// format.
pub(super) trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

impl<T> IntoResponseError<T> for Result<T, ProviderError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = match &e {
                ProviderError::Rejected { status } if *status == 401 || *status == 403 => {
                    StatusCode::BAD_REQUEST
                }
                ProviderError::Rejected { .. } => StatusCode::BAD_GATEWAY,
                ProviderError::Unavailable(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })
    }
}

impl<T> IntoResponseError<T> for Result<T, SessionError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = match &e {
                SessionError::RefreshRaceLost => StatusCode::FORBIDDEN,
                SessionError::Claims(_) => StatusCode::BAD_REQUEST,
                SessionError::Provider(ProviderError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })
    }
}
