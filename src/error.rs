//! Error types for the shop API access layer
//!
//! Every public operation returns `Result<T, Error>` where `Error` is defined
//! here. Transient and permanent request failures are told apart by variant,
//! never by message text: a raw HTTP or transport failure is classified once,
//! in [`Error::from_status`] or [`Error::from_transport`], and keeps that
//! classification on the way up.

use crate::pagination::AggregationMetadata;
use std::fmt;
use thiserror::Error;

/// Longest response body excerpt carried in an error message
const MAX_BODY_EXCERPT: usize = 256;

/// The main error type for the access layer
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    /// Token exchange failed. Never retried: credentials do not fix themselves.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The requested shop is not part of the token's granted scope.
    #[error("Not authorized for shop {shop_id}")]
    Unauthorized { shop_id: u64 },

    // ============================================================================
    // Request Errors
    // ============================================================================
    /// 429, 5xx, or a transport timeout/connection failure
    #[error("Temporary failure{}: {message}", fmt_status(*status))]
    Temporary { status: Option<u16>, message: String },

    /// Any other 4xx, or a response that could not be decoded
    #[error("Permanent failure{}: {message}", fmt_status(*status))]
    Permanent { status: Option<u16>, message: String },

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // Aggregation Errors
    // ============================================================================
    #[error("Aggregation failed during {stage} after {} page(s), {} record(s): {source}", metadata.pages_traversed, metadata.records_fetched)]
    Aggregation {
        stage: AggregationStage,
        metadata: AggregationMetadata,
        #[source]
        source: Box<Error>,
    },
}

/// Stage of a multi-page aggregation at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStage {
    /// Fetching a page from the API
    Fetch,
    /// Post-processing the fetched items
    Process,
}

impl fmt::Display for AggregationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Process => f.write_str("process"),
        }
    }
}

fn fmt_status(status: Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Trim a response body down to something fit for an error message
pub(crate) fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a permanent error with no HTTP status
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Create a decode error. A body that does not match the expected shape
    /// will not match it on the next attempt either.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::permanent(format!("failed to decode response: {}", message.into()))
    }

    /// Classify a non-success HTTP status.
    ///
    /// 429 and 5xx are temporary; everything else is permanent.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = excerpt(body);
        if is_retryable_status(status) {
            Self::Temporary {
                status: Some(status),
                message,
            }
        } else {
            Self::Permanent {
                status: Some(status),
                message,
            }
        }
    }

    /// Classify a transport-level failure.
    ///
    /// Timeouts and connection failures are temporary. Anything else reqwest
    /// reports (bad request construction, redirect loops, body errors) is not
    /// going to improve on a second try.
    pub fn from_transport(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        // reqwest includes the URL, never headers, so no token leaks here
        let message = err.to_string();
        if let Some(code) = status {
            return Self::from_status(code, &message);
        }
        if err.is_timeout() || err.is_connect() {
            Self::Temporary { status, message }
        } else {
            Self::Permanent { status, message }
        }
    }

    /// Check if this error may succeed on retry
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary { .. })
    }

    /// HTTP status captured when the error was classified, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Temporary { status, .. } | Self::Permanent { status, .. } => *status,
            Self::Aggregation { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Wrap a failure with the partial progress of an aggregation
    pub fn aggregation(stage: AggregationStage, metadata: AggregationMetadata, source: Error) -> Self {
        Self::Aggregation {
            stage,
            metadata,
            source: Box::new(source),
        }
    }
}

/// Check if an HTTP status code is retryable
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Result type alias for the access layer
pub type Result<T> = std::result::Result<T, Error>;
