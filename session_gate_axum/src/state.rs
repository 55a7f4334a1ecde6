use std::sync::Arc;

use session_gate::{
    CacheStore, IdentityProvider, KeycloakClient, KeycloakConfig, SessionError, StoreConfig,
    TokenRotationService, connect_cache_store,
};

struct Inner {
    rotation: TokenRotationService,
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<dyn CacheStore>,
}

/// Shared state of the auth routes and middleware. Cheap to clone; built once
/// at startup and handed to [`auth_router`](crate::auth_router).
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<Inner>,
}

impl AuthState {
    pub fn new(cache: Arc<dyn CacheStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            inner: Arc::new(Inner {
                rotation: TokenRotationService::new(cache.clone(), provider.clone()),
                provider,
                cache,
            }),
        }
    }

    /// Connect the backing store and the identity provider from environment
    /// configuration.
    pub async fn from_env() -> Result<Self, SessionError> {
        let store_config = StoreConfig::from_env()?;
        let cache = connect_cache_store(&store_config).await?;

        let provider_config = KeycloakConfig::from_env()?;
        let provider: Arc<dyn IdentityProvider> = Arc::new(KeycloakClient::new(&provider_config)?);

        Ok(Self::new(cache, provider))
    }

    pub fn rotation(&self) -> &TokenRotationService {
        &self.inner.rotation
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.inner.provider
    }

    /// Probe both dependencies. Used by the health endpoint.
    pub async fn health_check(&self) -> Result<(), SessionError> {
        self.inner.cache.ping().await?;
        self.inner.provider.health().await?;
        Ok(())
    }
}
