use async_trait::async_trait;

use crate::error::FetchError;

pub mod decode;
pub mod http;
pub mod planner;
pub mod request;

pub use decode::{decode_records, RawQuoteRecord};
pub use http::HttpQuoteSource;
pub use planner::{batch_count, partition_ranges, BatchDescriptor, BatchPlanner};
pub use request::{prepare_request, PreparedRequest, RequestContext};

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Performs the remote request for one batch.
///
/// A failure covers the whole batch: it contributes no records and the
/// caller logs the error and moves on. Implementations do not retry.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, batch: &BatchDescriptor) -> FetchResult<Vec<RawQuoteRecord>>;
}

#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}
