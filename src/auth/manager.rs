//! Token manager implementation
//!
//! Handles the client-credentials exchange and caching of the resulting token.

use super::guard::check_authorized;
use super::types::{AccessToken, TokenResponse};
use crate::error::{excerpt, Error, Result};
use crate::http::{join_url, read_capped};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Path of the token endpoint, relative to the API base URL
pub const TOKEN_PATH: &str = "oauth/token";

/// Cap on the token endpoint's response body
pub const MAX_TOKEN_RESPONSE_BYTES: usize = 64 * 1024;

/// Owns the bearer token shared by all requests of one client
pub struct TokenManager {
    /// HTTP client for token requests
    http_client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
    /// Cached token. Writers hold the lock across the whole exchange so that
    /// concurrent callers seeing an expired token trigger one refresh.
    cached_token: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    /// Create a token manager for the API at `base_url`
    pub fn new(
        http_client: Client,
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            token_url: join_url(base_url, TOKEN_PATH),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout,
            cached_token: RwLock::new(None),
        }
    }

    /// Return a valid token, authenticating first if none is held or the
    /// held one has expired. A no-op (one read lock) while the token is valid.
    pub async fn ensure_authenticated(&self) -> Result<AccessToken> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
        }

        let token = self.exchange().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Perform a token exchange unconditionally and store the result
    pub async fn authenticate(&self) -> Result<AccessToken> {
        let mut cached = self.cached_token.write().await;
        let token = self.exchange().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Ensure a token and check that it covers `shop_id` (0 = unspecified)
    pub async fn check_authorized(&self, shop_id: u64) -> Result<()> {
        let token = self.ensure_authenticated().await?;
        check_authorized(&token, shop_id)
    }

    /// Shop ids granted to the current token, authenticating if needed
    pub async fn scope(&self) -> Result<BTreeSet<u64>> {
        Ok(self.ensure_authenticated().await?.scope)
    }

    /// Drop the cached token so the next request re-authenticates
    pub async fn invalidate(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// Drop the cached token only if it is still `stale`. A token refreshed
    /// by another caller in the meantime is kept.
    pub async fn invalidate_if(&self, stale: &AccessToken) -> bool {
        let mut cached = self.cached_token.write().await;
        if cached.as_ref().map(AccessToken::secret) == Some(stale.secret()) {
            *cached = None;
            debug!("Invalidated rejected token");
            true
        } else {
            false
        }
    }

    /// Exchange client credentials for a token. Failures are never retried.
    async fn exchange(&self) -> Result<AccessToken> {
        debug!(url = %self.token_url, "Requesting access token");

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let issued_at = Utc::now();

        let response = self
            .http_client
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Basic {credentials}"))
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::authentication(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = read_capped(response, MAX_TOKEN_RESPONSE_BYTES).await;

        if !status.is_success() {
            let body = body.unwrap_or_default();
            return Err(Error::authentication(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                excerpt(&String::from_utf8_lossy(&body))
            )));
        }

        let body = body.map_err(|e| Error::authentication(format!("invalid token response: {e}")))?;
        let token_response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::authentication(format!("invalid token response: {e}")))?;

        let token = token_response.into_access_token(issued_at);
        info!(
            shops = token.scope.len(),
            expires_at = %token.expires_at,
            "Authenticated"
        );
        Ok(token)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
