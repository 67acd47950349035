//! Pagination types
//!
//! The page envelope as returned by the API, and the result of an
//! aggregation across pages.

use crate::error::{AggregationStage, Error, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::time::{Duration, Instant};

/// One page of a paginated endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page, in API order
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    /// Whether this is the final page
    #[serde(default)]
    pub last: bool,
    #[serde(default)]
    pub first: bool,
    /// Requested page size
    #[serde(default)]
    pub size: u32,
    /// 0-based page index
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub number_of_elements: u32,
    #[serde(default)]
    pub empty: bool,
}

impl<T> Page<T> {
    /// Build a page from items, mostly for tests and adapters
    pub fn new(content: Vec<T>, number: u32, last: bool) -> Self {
        let count = content.len() as u32;
        Self {
            total_pages: 0,
            total_elements: 0,
            first: number == 0,
            size: count,
            number,
            number_of_elements: count,
            empty: count == 0,
            last,
            content,
        }
    }

    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Check if the page carries no items
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// What an aggregation did, returned with its items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationMetadata {
    /// Items received across all pages
    pub records_fetched: u64,
    /// Items left after post-processing (equal to `records_fetched` until
    /// [`Aggregation::process`] runs)
    pub records_retained: u64,
    /// Pages fetched
    pub pages_traversed: u32,
    /// Wall-clock time spent
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Items accumulated across pages plus the metadata describing how
#[derive(Debug, Clone)]
pub struct Aggregation<T> {
    pub items: Vec<T>,
    pub metadata: AggregationMetadata,
}

impl<T> Aggregation<T> {
    /// Apply a post-processing step (filtering, projection, ...) to the
    /// fetched items. A failure is reported as an aggregation error at the
    /// process stage, carrying the fetch metadata.
    pub fn process<U, F>(self, f: F) -> Result<Aggregation<U>>
    where
        F: FnOnce(Vec<T>) -> Result<Vec<U>>,
    {
        let start = Instant::now();
        let mut metadata = self.metadata;
        match f(self.items) {
            Ok(items) => {
                metadata.records_retained = items.len() as u64;
                metadata.elapsed += start.elapsed();
                Ok(Aggregation { items, metadata })
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                metadata.records_retained = 0;
                metadata.elapsed += start.elapsed();
                Err(Error::aggregation(AggregationStage::Process, metadata, err))
            }
        }
    }
}
