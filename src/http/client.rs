//! API client: authenticated, rate-limited, retried requests
//!
//! Every logical request goes through the same steps, in order:
//! 1. ensure a valid bearer token
//! 2. check the target shop against the token's scope
//! 3. wait for a rate-limiter permit
//! 4. run the HTTP attempt under the retryer, classifying each failure
//! 5. decode the capped response body

use super::rate_limit::RateLimiter;
use super::retry::{RetryPolicy, Retryer};
use crate::auth::{check_authorized, TokenManager};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::pagination::{fetch_all_pages, fetch_until, Aggregation, AggregationMetadata, Page};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Query parameter carrying the shop id on resource requests
pub const SHOP_PARAM: &str = "shop";

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, sent in order
    pub query: Vec<(String, String)>,
    /// Shop the request targets; 0 = none
    pub shop_id: u64,
    /// Request body (JSON)
    pub body: Option<Value>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add several query parameters
    #[must_use]
    pub fn queries(mut self, params: &[(String, String)]) -> Self {
        self.query.extend_from_slice(params);
        self
    }

    /// Target a shop. Checked against the token scope and sent as `?shop=`.
    #[must_use]
    pub fn shop(mut self, shop_id: u64) -> Self {
        self.shop_id = shop_id;
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn has_param(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }
}

/// Client for the shop API. Cheap to share behind an `Arc`; every clone of
/// the inner token manager and rate limiter is the same instance.
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    tokens: Arc<TokenManager>,
    rate_limiter: RateLimiter,
    retryer: Retryer,
}

impl ApiClient {
    /// Build a client from a validated config
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        let tokens = Arc::new(TokenManager::new(
            client.clone(),
            &config.base_url,
            config.client_id.clone(),
            config.client_secret.clone(),
            config.timeout(),
        ));
        let rate_limiter = RateLimiter::new(&config.rate_limit);
        let retryer = Retryer::new(RetryPolicy::new(config.max_retries, config.max_backoff()));

        Ok(Self {
            client,
            config,
            tokens,
            rate_limiter,
            retryer,
        })
    }

    /// The config this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The token manager shared by all requests of this client
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Execute one logical request and decode the JSON response into `T`
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: &RequestConfig,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let token = cancellable(cancel, self.tokens.ensure_authenticated()).await?;
        check_authorized(&token, request.shop_id)?;

        self.rate_limiter.wait(cancel).await?;

        let url = join_url(&self.config.base_url, path);
        debug!(%method, path, shop = request.shop_id, "Sending request");

        let url = url.as_str();
        let method = &method;
        self.retryer
            .run(cancel, move |_| self.attempt(method, url, request, cancel))
            .await
    }

    /// GET a single JSON document
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        shop_id: u64,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = RequestConfig::new().queries(query).shop(shop_id);
        self.execute(Method::GET, path, &request, cancel).await
    }

    /// GET one page of a paginated endpoint
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        shop_id: u64,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Page<T>> {
        let request = RequestConfig::new()
            .queries(query)
            .query("page", page.to_string())
            .query("size", self.config.page_size.to_string())
            .shop(shop_id);
        self.execute(Method::GET, path, &request, cancel).await
    }

    /// Fetch every page of `path`, up to `max_pages`
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        shop_id: u64,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Aggregation<T>> {
        fetch_all_pages(
            move |page| self.get_page(path, query, shop_id, page, cancel),
            max_pages,
        )
        .await
    }

    /// Fetch pages of `path` until at least `limit` items are collected, then
    /// keep exactly the first `limit`
    pub async fn list_until<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        shop_id: u64,
        limit: usize,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Aggregation<T>> {
        if limit == 0 {
            return Ok(Aggregation {
                items: Vec::new(),
                metadata: AggregationMetadata::default(),
            });
        }

        fetch_until(
            move |page| self.get_page(path, query, shop_id, page, cancel),
            |items: &[T]| items.len() >= limit,
            max_pages,
        )
        .await?
        .process(|mut items| {
            items.truncate(limit);
            Ok(items)
        })
    }

    /// One HTTP attempt. Every failure leaves here already classified.
    async fn attempt<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &str,
        request: &RequestConfig,
        cancel: &CancellationToken,
    ) -> Result<T> {
        // Re-checked per attempt: a backoff may outlive the token
        let token = cancellable(cancel, self.tokens.ensure_authenticated()).await?;

        let mut req = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if request.shop_id != 0 && !request.has_param(SHOP_PARAM) {
            req = req.query(&[(SHOP_PARAM, request.shop_id.to_string())]);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        let response = cancellable(cancel, async {
            req.send().await.map_err(Error::from_transport)
        })
        .await?;

        let status = response.status();
        let body = match cancellable(cancel, read_capped(response, self.config.max_response_bytes)).await {
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            other => other,
        };

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Revoked upstream; the next request starts with a fresh exchange
                // unless another caller already replaced this token
                self.tokens.invalidate_if(&token).await;
            }
            let body = body.unwrap_or_default();
            return Err(Error::from_status(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        let body = body?;
        serde_json::from_slice(&body).map_err(|e| Error::decode(e.to_string()))
    }

    /// The rate limiter shared by all requests of this client
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("retry_policy", self.retryer.policy())
            .finish_non_exhaustive()
    }
}

/// Race a future against cancellation
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Read a response body, giving up once it grows past `max_bytes`
pub(crate) async fn read_capped(mut response: Response, max_bytes: usize) -> Result<Vec<u8>> {
    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(Error::permanent(format!(
                "response body of {len} bytes exceeds limit of {max_bytes}"
            )));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(Error::from_transport)? {
        if body.len() + chunk.len() > max_bytes {
            return Err(Error::permanent(format!(
                "response body exceeds limit of {max_bytes} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Join a base URL and a path with exactly one slash between them.
/// Absolute URLs are returned as-is.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
