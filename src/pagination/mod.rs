//! Pagination module
//!
//! Multi-page aggregation over the API's uniform page envelope.
//!
//! # Overview
//!
//! [`fetch_all_pages`] and [`fetch_until`] drive any page-fetch function
//! sequentially from page 0, accumulating items until the API reports the
//! last page, a page comes back empty, the page budget runs out, or (for
//! `fetch_until`) a caller-supplied condition is met. Pages are never fetched
//! concurrently: they share the client's rate budget with everything else.

mod aggregator;
mod types;

pub use aggregator::{fetch_all_pages, fetch_until};
pub use types::{Aggregation, AggregationMetadata, Page};
