use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use http::HeaderMap;
use http::header::{COOKIE, SET_COOKIE};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::session::config::{
    COOKIE_EXPIRY_SKEW_SECS, COOKIE_SECRET, SESSION_COOKIE_DOMAIN, SESSION_COOKIE_NAME,
};
use crate::session::errors::SessionError;
use crate::utils::{base64url_decode, base64url_encode};

type HmacSha256 = Hmac<Sha256>;

/// Hex length of each cookie half. The session key occupies chars 0..1024 of
/// the payload and the session token chars 1025..2049, with a separating dot.
const SECRET_HEX_LEN: usize = 1024;
const PAYLOAD_LEN: usize = SECRET_HEX_LEN * 2 + 1;

fn mac_for(payload: &[u8]) -> Result<HmacSha256, SessionError> {
    let mut mac = HmacSha256::new_from_slice(&COOKIE_SECRET)
        .map_err(|_| SessionError::Cookie("Invalid cookie secret".to_string()))?;
    mac.update(payload);
    Ok(mac)
}

/// Sign `<sessionKey>.<sessionToken>` into the value carried by the cookie:
/// the payload followed by a base64url HMAC-SHA256 tag.
pub(crate) fn sign_cookie_value(session_key: &str, session_token: &str) -> Result<String, SessionError> {
    let payload = format!("{session_key}.{session_token}");
    let tag = mac_for(payload.as_bytes())?.finalize().into_bytes();
    Ok(format!("{payload}.{}", base64url_encode(&tag)))
}

/// Verify the signature and split the payload at its fixed offsets.
///
/// Any malformed value is rejected before a store lookup is attempted: wrong
/// length, bad signature, missing separator, non-hex halves.
pub fn parse_session_cookie(value: &str) -> Result<(String, String), SessionError> {
    let (payload, tag) = value
        .rsplit_once('.')
        .ok_or_else(|| SessionError::Cookie("Unsigned cookie value".to_string()))?;

    let tag = base64url_decode(tag)
        .map_err(|_| SessionError::Cookie("Invalid cookie signature encoding".to_string()))?;
    let expected = mac_for(payload.as_bytes())?.finalize().into_bytes();
    if !bool::from(expected.ct_eq(&tag)) {
        return Err(SessionError::Cookie("Cookie signature mismatch".to_string()));
    }

    if payload.len() != PAYLOAD_LEN || payload.as_bytes()[SECRET_HEX_LEN] != b'.' {
        return Err(SessionError::Cookie("Malformed cookie payload".to_string()));
    }

    let session_key = &payload[..SECRET_HEX_LEN];
    let session_token = &payload[SECRET_HEX_LEN + 1..];

    if !session_key.chars().all(|c| c.is_ascii_hexdigit())
        || !session_token.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(SessionError::Cookie("Malformed cookie payload".to_string()));
    }

    Ok((session_key.to_string(), session_token.to_string()))
}

fn cookie_attributes() -> String {
    match SESSION_COOKIE_DOMAIN.as_deref() {
        Some(domain) => format!("Domain={domain}; SameSite=Lax; HttpOnly; Path=/"),
        None => "SameSite=Lax; HttpOnly; Path=/".to_string(),
    }
}

/// Append a `Set-Cookie` header carrying the signed session cookie, expiring
/// at the refresh-token expiry plus the fixed skew buffer.
pub(crate) fn append_session_cookie(
    headers: &mut HeaderMap,
    session_key: &str,
    session_token: &str,
    expires_unix: i64,
    now: DateTime<Utc>,
) -> Result<(), SessionError> {
    let value = sign_cookie_value(session_key, session_token)?;
    let expires_at = Utc
        .timestamp_opt(expires_unix + COOKIE_EXPIRY_SKEW_SECS, 0)
        .single()
        .ok_or_else(|| SessionError::Cookie("Cookie expiry out of range".to_string()))?;
    let max_age = (expires_at - now).num_seconds().max(0);

    let cookie = format!(
        "{}={}; {}; Expires={}; Max-Age={}",
        SESSION_COOKIE_NAME.as_str(),
        value,
        cookie_attributes(),
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        max_age,
    );

    headers.append(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| SessionError::Cookie("Failed to parse cookie".to_string()))?,
    );
    Ok(())
}

/// Append a `Set-Cookie` header that clears the session cookie, issued on
/// logout and on unrecoverable validation failures.
pub fn append_clear_session_cookie(headers: &mut HeaderMap) -> Result<(), SessionError> {
    let cookie = format!(
        "{}=; {}; Max-Age=-86400",
        SESSION_COOKIE_NAME.as_str(),
        cookie_attributes(),
    );
    headers.append(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| SessionError::Cookie("Failed to parse cookie".to_string()))?,
    );
    Ok(())
}

/// Find the session cookie value among the request's `Cookie` headers.
pub fn session_cookie_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookie_name = SESSION_COOKIE_NAME.as_str();
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|s| {
            let mut parts = s.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) if k == cookie_name => Some(v.to_string()),
                _ => None,
            }
        })
}

/// HMAC-signed, base64url-encoded blob for the `X-User` response header.
pub fn sign_user_blob<T: serde::Serialize>(value: &T) -> Result<String, SessionError> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| SessionError::Cookie(format!("Failed to serialize user blob: {e}")))?;
    let encoded = base64url_encode(&payload);
    let tag = mac_for(encoded.as_bytes())?.finalize().into_bytes();
    Ok(format!("{encoded}.{}", base64url_encode(&tag)))
}
