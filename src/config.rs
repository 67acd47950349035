//! Client configuration
//!
//! A [`ClientConfig`] is built once (from a builder, a YAML/JSON file, or the
//! environment), validated, and then handed to [`crate::http::ApiClient`],
//! which never mutates it.

use crate::error::{Error, Result};
use crate::http::RateLimiterConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Prefix for environment variables read by [`ClientConfig::from_env`]
pub const ENV_PREFIX: &str = "SHOPAPI_";

/// Default response body cap (10 MiB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// Client Config
// ============================================================================

/// Immutable configuration for an API client
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., `https://sandbox.example.com`)
    pub base_url: String,

    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for temporary failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on a single retry backoff, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Outbound rate limit shared by every request of the client
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,

    /// Hard cap on a response body, in bytes
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Default page budget for multi-page fetches
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_backoff_secs() -> u64 {
    30
}

fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    100
}

fn default_user_agent() -> String {
    format!("shopapi-core/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_backoff_secs: default_max_backoff_secs(),
            rate_limit: RateLimiterConfig::default(),
            max_response_bytes: default_max_response_bytes(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("max_backoff_secs", &self.max_backoff_secs)
            .field("rate_limit", &self.rate_limit)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load a config from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from `SHOPAPI_*` environment variables.
    ///
    /// `SHOPAPI_BASE_URL`, `SHOPAPI_CLIENT_ID` and `SHOPAPI_CLIENT_SECRET` are
    /// required; `SHOPAPI_TIMEOUT_SECS`, `SHOPAPI_MAX_RETRIES` and
    /// `SHOPAPI_MAX_BACKOFF_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let required = |name: &str| {
            var(name).ok_or_else(|| Error::config(format!("{ENV_PREFIX}{name} is not set")))
        };

        let mut builder = Self::builder()
            .base_url(required("BASE_URL")?)
            .credentials(required("CLIENT_ID")?, required("CLIENT_SECRET")?);

        if let Some(v) = var("TIMEOUT_SECS") {
            builder = builder.timeout(Duration::from_secs(parse_var("TIMEOUT_SECS", &v)?));
        }
        if let Some(v) = var("MAX_RETRIES") {
            builder = builder.max_retries(parse_var("MAX_RETRIES", &v)?);
        }
        if let Some(v) = var("MAX_BACKOFF_SECS") {
            builder = builder.max_backoff(Duration::from_secs(parse_var("MAX_BACKOFF_SECS", &v)?));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::config("base_url is required"));
        }
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(Error::config("client_id and client_secret are required"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be positive"));
        }
        if self.rate_limit.requests_per_second == 0 {
            return Err(Error::config("rate_limit.requests_per_second must be positive"));
        }
        if self.page_size == 0 {
            return Err(Error::config("page_size must be positive"));
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff cap
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{ENV_PREFIX}{name} has an invalid value")))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set client id and secret
    #[must_use]
    pub fn credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self.config.client_secret = client_secret.into();
        self
    }

    /// Set the request timeout, rounded up to whole seconds
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let round_up = u64::from(timeout.subsec_nanos() > 0);
        self.config.timeout_secs = timeout.as_secs().saturating_add(round_up);
        self
    }

    /// Set max retries
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the backoff cap
    #[must_use]
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.config.max_backoff_secs = max.as_secs();
        self
    }

    /// Set the rate limit
    #[must_use]
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Set the response body cap
    #[must_use]
    pub fn max_response_bytes(mut self, bytes: usize) -> Self {
        self.config.max_response_bytes = bytes;
        self
    }

    /// Set the page size
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the default page budget
    #[must_use]
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.config.max_pages = pages;
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
