use std::sync::LazyLock;

/// Route prefix under which the auth endpoints are mounted.
///
/// Default: "/auth"
pub static AUTH_ROUTE_PREFIX: LazyLock<String> =
    LazyLock::new(|| std::env::var("AUTH_ROUTE_PREFIX").unwrap_or_else(|_| "/auth".to_string()));
