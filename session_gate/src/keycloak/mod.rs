mod config;
mod errors;
mod main;
mod types;

pub use config::KeycloakConfig;
pub use errors::ProviderError;
pub use main::{IdentityProvider, KeycloakClient};
pub use types::{Introspection, RealmAccess, TokenGrant};
