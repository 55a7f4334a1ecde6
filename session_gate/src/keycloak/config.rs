use std::env;
use std::time::Duration;

use crate::keycloak::errors::ProviderError;

/// Identity-provider connection parameters, read from the environment.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    /// Bounded timeout applied to every outbound provider call.
    pub request_timeout: Duration,
}

impl KeycloakConfig {
    pub fn from_env() -> Result<Self, ProviderError> {
        dotenvy::dotenv().ok();

        let required = |name: &str| {
            env::var(name).map_err(|_| ProviderError::Config(format!("{name} must be set")))
        };

        let request_timeout = env::var("KEYCLOAK_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(10_000));

        Ok(Self {
            base_url: required("KEYCLOAK_URL")?,
            realm: required("KEYCLOAK_REALM")?,
            client_id: required("KEYCLOAK_CLIENT_ID")?,
            client_secret: required("KEYCLOAK_CLIENT_SECRET")?,
            request_timeout,
        })
    }
}
