//! HTTP module
//!
//! The request path of the client: token, scope check, rate limit, retry,
//! capped decode.
//!
//! # Features
//!
//! - **Rate Limiting**: Token bucket rate limiter using governor, one per client
//! - **Retries**: Exponential backoff with jitter, temporary failures only
//! - **Classification**: Status codes and transport failures are tagged
//!   temporary or permanent where they are first seen
//! - **Bounded Bodies**: Responses are read under a hard size cap

mod client;
mod rate_limit;
mod retry;

pub(crate) use client::{cancellable, join_url, read_capped};
pub use client::{ApiClient, RequestConfig, SHOP_PARAM};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{Attempt, AttemptOutcome, RetryPolicy, Retryer};

#[cfg(test)]
mod tests;
