//! Sequential page aggregation

use super::types::{Aggregation, AggregationMetadata, Page};
use crate::error::{AggregationStage, Error, Result};
use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// Fetch pages `0..max_pages` until one is marked last or comes back empty.
///
/// Any fetch failure aborts the aggregation with [`Error::Aggregation`]
/// holding the progress made so far; cancellation propagates as
/// [`Error::Cancelled`] with nothing attached.
pub async fn fetch_all_pages<T, F, Fut>(fetch_page: F, max_pages: u32) -> Result<Aggregation<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    fetch_until(fetch_page, |_: &[T]| false, max_pages).await
}

/// Like [`fetch_all_pages`], but also stops as soon as `condition` holds for
/// the items collected so far. The condition is checked after every page.
pub async fn fetch_until<T, F, Fut, C>(
    mut fetch_page: F,
    mut condition: C,
    max_pages: u32,
) -> Result<Aggregation<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    C: FnMut(&[T]) -> bool,
{
    let start = Instant::now();
    let mut items = Vec::new();
    let mut metadata = AggregationMetadata::default();

    for index in 0..max_pages {
        let page = match fetch_page(index).await {
            Ok(page) => page,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                metadata.elapsed = start.elapsed();
                return Err(Error::aggregation(AggregationStage::Fetch, metadata, err));
            }
        };

        let count = page.len();
        let last = page.last;
        metadata.pages_traversed += 1;
        metadata.records_fetched += count as u64;
        items.extend(page.content);

        debug!(page = index, count, last, total = items.len(), "Fetched page");

        if last || count == 0 {
            break;
        }
        if condition(&items) {
            debug!(page = index, total = items.len(), "Stop condition met");
            break;
        }
    }

    metadata.records_retained = items.len() as u64;
    metadata.elapsed = start.elapsed();
    Ok(Aggregation { items, metadata })
}
