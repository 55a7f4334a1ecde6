use std::env;
use std::sync::LazyLock;

pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("sessionId".to_string())
});

/// Domain attribute for the issued cookie.
pub static SESSION_COOKIE_DOMAIN: LazyLock<Option<String>> =
    LazyLock::new(|| std::env::var("FRONTEND_DOMAIN").ok());

/// Grace window during which the immediately-previous session token is still
/// accepted, in minutes.
pub static OLD_TOKEN_LIFESPAN: LazyLock<i64> = LazyLock::new(|| {
    std::env::var("OLD_TOKEN_LIFESPAN")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5)
});

pub(crate) static COOKIE_SECRET: LazyLock<Vec<u8>> =
    LazyLock::new(|| match env::var("COOKIE_SECRET") {
        Ok(secret) => secret.into_bytes(),
        Err(_) => "default_secret_key_change_in_production"
            .to_string()
            .into_bytes(),
    });

/// Skew added on top of the refresh-token expiry when computing cookie
/// expiry, in seconds. Keeps the cookie alive slightly past the moment the
/// refresh token itself lapses.
pub(crate) const COOKIE_EXPIRY_SKEW_SECS: i64 = 3 * 60 * 60;

/// Byte length of session keys and session tokens before hex encoding.
pub(crate) const SESSION_SECRET_BYTES: usize = 512;

/// Bounded number of session-key generation attempts before reporting a key
/// allocation failure.
pub(crate) const SESSION_KEY_ATTEMPTS: u32 = 5;
