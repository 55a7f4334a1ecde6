use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use tracing::Instrument;
use uuid::Uuid;

/// Per-request correlation id, generated at the edge and available to
/// handlers as an extension.
#[derive(Clone, Debug)]
pub struct ContextId(pub Uuid);

/// Assign a fresh context id to the request, expose it as the `X-Context-Id`
/// response header and scope a tracing span around the whole request.
pub async fn context_id(mut req: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    req.extensions_mut().insert(ContextId(id));

    let span = tracing::info_span!("request", context_id = %id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert("X-Context-Id", value);
    }
    response
}
