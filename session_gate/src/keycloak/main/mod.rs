mod client;

pub use client::{IdentityProvider, KeycloakClient};
