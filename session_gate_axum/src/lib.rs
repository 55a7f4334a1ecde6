//! Axum integration for the `session-gate` token-rotation library.
//!
//! [`auth_router`] mounts the login/status/logout/health endpoints under
//! [`AUTH_ROUTE_PREFIX`], and [`authenticate`] is the middleware that guards
//! any other route: it resolves the rotating session cookie, refreshes the
//! provider tokens in flight when they lapse, and exposes the caller as an
//! [`AuthUser`] (or [`AuthClient`] for service accounts) extractor.
//!
//! ```no_run
//! use axum::Router;
//! use session_gate_axum::{AuthState, auth_router};
//!
//! # async fn build() -> Result<Router, session_gate::SessionError> {
//! let state = AuthState::from_env().await?;
//! let app: Router = auth_router(state);
//! # Ok(app)
//! # }
//! ```

mod config;
mod context;
mod error;
mod middleware;
mod router;
mod session;
mod state;

#[cfg(test)]
mod test_utils;

pub use config::AUTH_ROUTE_PREFIX;
pub use context::{ContextId, context_id};
pub use middleware::authenticate;
pub use router::{LoginRequest, auth_router};
pub use session::{AuthClient, AuthUser};
pub use state::AuthState;
