//! Token types
//!
//! An [`AccessToken`] is created by the token exchange and replaced wholesale
//! on the next one; it is never mutated in place.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Lifetime assumed when the token endpoint omits `expires_in` (24 hours)
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// A token is treated as expired this many seconds before its nominal
/// expiry, so it cannot lapse between the check and the request landing.
pub const EXPIRY_SKEW_SECS: i64 = 30;

/// Bearer token with its expiry and granted shop scope
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    /// When the token was issued
    pub issued_at: DateTime<Utc>,
    /// When the token stops being valid
    pub expires_at: DateTime<Utc>,
    /// Shop ids the token may operate on
    pub scope: BTreeSet<u64>,
}

impl AccessToken {
    /// Create a new token
    pub fn new(
        token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        scope: BTreeSet<u64>,
    ) -> Self {
        Self {
            token: token.into(),
            issued_at,
            expires_at,
            scope,
        }
    }

    /// The bearer value. Never log this.
    pub fn secret(&self) -> &str {
        &self.token
    }

    /// Check if the token is expired (with [`EXPIRY_SKEW_SECS`] of slack)
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against an explicit clock reading
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    /// Check if the token grants access to `shop_id`
    pub fn grants(&self, shop_id: u64) -> bool {
        self.scope.contains(&shop_id)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Parse a space-separated scope string into shop ids.
///
/// Entries that are not shop ids are skipped.
pub(crate) fn parse_scope(scope: &str) -> BTreeSet<u64> {
    scope
        .split_whitespace()
        .filter_map(|entry| match entry.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(entry, "Ignoring non-numeric scope entry");
                None
            }
        })
        .collect()
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn into_access_token(self, issued_at: DateTime<Utc>) -> AccessToken {
        if let Some(kind) = self.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                debug!(token_type = kind, "Unexpected token type, sending as bearer");
            }
        }
        let lifetime = self
            .expires_in
            .map_or(Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS), |secs| {
                Duration::seconds(secs.max(0))
            });
        let scope = self.scope.as_deref().map(parse_scope).unwrap_or_default();
        AccessToken::new(self.access_token, issued_at, issued_at + lifetime, scope)
    }
}
