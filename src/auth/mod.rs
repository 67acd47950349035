//! Authentication module
//!
//! OAuth2 client-credentials token management and shop-scope checks.
//!
//! The [`TokenManager`] owns the bearer token shared by every request of a
//! client. Refresh happens lazily: each request calls
//! [`TokenManager::ensure_authenticated`], which only hits the token endpoint
//! when no token is held or the held one has expired.

mod guard;
mod manager;
mod types;

pub use guard::check_authorized;
pub use manager::{TokenManager, MAX_TOKEN_RESPONSE_BYTES};
pub use types::{AccessToken, DEFAULT_TOKEN_LIFETIME_SECS, EXPIRY_SKEW_SECS};
