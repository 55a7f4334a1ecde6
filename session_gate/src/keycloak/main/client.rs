use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use url::Url;

use crate::keycloak::config::KeycloakConfig;
use crate::keycloak::errors::ProviderError;
use crate::keycloak::types::{Introspection, TokenGrant};

/// The identity-provider seam of the session subsystem. The production
/// implementation is [`KeycloakClient`]; tests substitute their own.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Password grant: exchange user credentials for a token pair.
    async fn password_login(
        &self,
        username: &str,
        password: &str,
        forwarded_for: Option<&str>,
    ) -> Result<TokenGrant, ProviderError>;

    /// Token introspection: is this access token still active, and for whom.
    async fn introspect(&self, access_token: &str) -> Result<Introspection, ProviderError>;

    /// Refresh grant: exchange a (single-use) refresh token for a new pair.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;

    /// Terminate the provider-side session.
    async fn revoke_session(&self, provider_session: &str) -> Result<(), ProviderError>;

    /// Liveness probe for health checks.
    async fn health(&self) -> Result<(), ProviderError>;
}

struct AdminToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Keycloak-backed [`IdentityProvider`]. Explicitly constructed from a
/// [`KeycloakConfig`] and injected wherever provider access is needed; every
/// request carries the configured timeout.
pub struct KeycloakClient {
    http: reqwest::Client,
    base_url: Url,
    realm: String,
    client_id: String,
    client_secret: String,
    /// Cached service-account token for admin calls.
    admin_token: RwLock<Option<AdminToken>>,
}

impl KeycloakClient {
    pub fn new(config: &KeycloakConfig) -> Result<Self, ProviderError> {
        // A trailing slash keeps Url::join from eating the last path segment
        // of a reverse-proxied base URL.
        let base_url = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))
            .map_err(|e| ProviderError::Config(format!("Invalid KEYCLOAK_URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            admin_token: RwLock::new(None),
        })
    }

    fn openid_url(&self, endpoint: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(&format!(
                "realms/{}/protocol/openid-connect/{endpoint}",
                self.realm
            ))
            .map_err(|e| ProviderError::Config(e.to_string()))
    }

    fn admin_url(&self, endpoint: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(&format!("admin/realms/{}/{endpoint}", self.realm))
            .map_err(|e| ProviderError::Config(e.to_string()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ProviderError> {
        let response = self
            .http
            .post(self.openid_url("token")?)
            .form(form)
            .send()
            .await?;

        let response = response.error_for_status()?;
        Ok(response.json::<TokenGrant>().await?)
    }

    /// Obtain a service-account access token via the client-credentials
    /// grant, reusing the cached one until it is within 10 seconds of expiry.
    async fn admin_access_token(&self) -> Result<String, ProviderError> {
        {
            let cached = self.admin_token.read().await;
            if let Some(token) = cached.as_ref()
                && !needs_refresh(token.expires_at, Utc::now())
            {
                return Ok(token.access_token.clone());
            }
        }

        tracing::info!("Acquiring Keycloak service-account token");
        let grant = self
            .token_request(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .await?;

        let expires_at = Utc::now() + Duration::seconds(grant.expires_in);
        let access_token = grant.access_token.clone();
        *self.admin_token.write().await = Some(AdminToken {
            access_token: access_token.clone(),
            expires_at,
        });
        Ok(access_token)
    }
}

/// A cached admin token is refreshed once it is within 10 seconds of expiry.
fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now + Duration::seconds(10)
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    async fn password_login(
        &self,
        username: &str,
        password: &str,
        forwarded_for: Option<&str>,
    ) -> Result<TokenGrant, ProviderError> {
        let mut request = self.http.post(self.openid_url("token")?).form(&[
            ("grant_type", "password"),
            ("username", username.trim()),
            ("password", password),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ]);
        if let Some(ip) = forwarded_for {
            request = request.header("X-Forwarded-For", ip);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<TokenGrant>().await?)
    }

    async fn introspect(&self, access_token: &str) -> Result<Introspection, ProviderError> {
        let response = self
            .http
            .post(self.openid_url("token/introspect")?)
            .form(&[
                ("token", access_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Introspection>().await?)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }

    async fn revoke_session(&self, provider_session: &str) -> Result<(), ProviderError> {
        let token = self.admin_access_token().await?;
        let response = self
            .http
            .delete(self.admin_url(&format!("sessions/{provider_session}"))?)
            .bearer_auth(token)
            .send()
            .await?;

        // Already-gone sessions make revocation a no-op.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn health(&self) -> Result<(), ProviderError> {
        let url = self
            .base_url
            .join("health")
            .map_err(|e| ProviderError::Config(e.to_string()))?;
        let response = self.http.get(url).send().await?.error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        match body.get("status").and_then(|s| s.as_str()) {
            Some("DOWN") => Err(ProviderError::Response("Keycloak status down".to_string())),
            _ => Ok(()),
        }
    }
}
