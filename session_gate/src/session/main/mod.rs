mod cookie;
mod guard;
mod rotation;
mod store;

#[cfg(test)]
pub(crate) mod test_utils;


pub use cookie::{
    append_clear_session_cookie, parse_session_cookie, session_cookie_from_headers, sign_user_blob,
};
pub use guard::ConcurrentRefreshGuard;
pub use rotation::{Clock, LoginOutcome, Refreshed, SystemClock, TokenRotationService};
pub use store::SessionStore;
