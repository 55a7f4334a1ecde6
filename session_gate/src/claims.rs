//! Unverified JWT payload decoding.
//!
//! Tokens handled here come straight from the identity provider over TLS;
//! signature verification is the provider's job (introspection), so only the
//! payload segment is decoded, never trusted for authorization on its own.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::utils::base64url_decode;

#[derive(Debug, Error, Clone)]
pub enum ClaimsError {
    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// Claims read from a provider-issued access token.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub session_state: Option<String>,
    /// Present on service-account tokens only.
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Claims read from a provider-issued refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshClaims {
    pub exp: i64,
}

fn decode_payload<T: DeserializeOwned>(token: &str) -> Result<T, ClaimsError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ClaimsError::Malformed("token has no payload segment".to_string()))?;
    let bytes = base64url_decode(payload)
        .map_err(|e| ClaimsError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Malformed(e.to_string()))
}

pub fn access_claims(token: &str) -> Result<AccessClaims, ClaimsError> {
    decode_payload(token)
}

pub fn refresh_claims(token: &str) -> Result<RefreshClaims, ClaimsError> {
    decode_payload(token)
}
