//! # Shop API access layer
//!
//! A resilient client core for an OAuth2-protected, rate-limited, paginated
//! shop management REST API.
//!
//! ## Features
//!
//! - **Token Management**: Client-credentials exchange, lazy refresh, one
//!   refresh at a time across concurrent callers
//! - **Shop Scope Checks**: Requests for shops outside the token scope fail
//!   before touching the network
//! - **Rate Limiting**: One shared token bucket per client
//! - **Retries**: Exponential backoff with jitter for 429/5xx/transport
//!   failures; other failures are returned immediately
//! - **Pagination**: Sequential page aggregation with page budgets and
//!   early-stop conditions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shopapi_core::{ApiClient, ClientConfig, Result};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ApiClient::new(ClientConfig::from_env()?)?;
//!     let cancel = CancellationToken::new();
//!
//!     let customers = client
//!         .list_until::<serde_json::Value>("/api/v1/customers", &[], 42, 50, 10, &cancel)
//!         .await?;
//!     println!("{} customers in {} pages", customers.items.len(), customers.metadata.pages_traversed);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Pagination (fetch_all / fetch_until)        │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │ page fetch
//! ┌───────────────────────────────┴──────────────────────────────┐
//! │                     ApiClient::execute                       │
//! │  token ─▶ scope check ─▶ rate limit ─▶ retry(attempt) ─▶ decode│
//! └──────────┬──────────────┬──────────────┬─────────────────────┘
//!            │              │              │
//!      TokenManager    RateLimiter      Retryer
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Client configuration
pub mod config;

/// Token management and shop-scope checks
pub mod auth;

/// API client with retry and rate limiting
pub mod http;

/// Multi-page aggregation
pub mod pagination;

/// Null/empty stripping for JSON output
pub mod compact;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::ClientConfig;
pub use error::{AggregationStage, Error, Result};
pub use http::{ApiClient, RequestConfig};
pub use pagination::{fetch_all_pages, fetch_until, Aggregation, AggregationMetadata, Page};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
