//! Data source capability consumed by the viewport.
//!
//! A [`DataSource`] answers two questions about a dataset at a given
//! interval: how many buckets exist, and what a contiguous range of them
//! looks like. Implementations:
//! - [`memory`] - datasets held in memory, for tests and embedding
//! - [`jsonl`] - a directory of JSON-lines candle files

pub mod jsonl;
pub mod memory;

use std::future::Future;

use crate::models::{Candle, Interval};

pub use jsonl::JsonlSource;
pub use memory::MemorySource;

/// Failure reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The backend is unavailable.
    #[error("data source is not connected")]
    NotConnected,

    /// The dataset does not exist at call time.
    #[error("dataset missing: {0}")]
    DatasetMissing(String),

    /// A query or parse failure.
    #[error("data error: {0}")]
    DataError(String),
}

/// Range access to bucketed candle data.
///
/// Implementations own their internal concurrency; the viewport issues at
/// most one request at a time per manager.
pub trait DataSource: Send + Sync {
    /// Total number of non-empty buckets for `dataset` at `interval`.
    fn get_bucket_count(
        &self,
        dataset: &str,
        interval: Interval,
    ) -> impl Future<Output = Result<usize, SourceError>> + Send;

    /// Returns up to `count` buckets starting at bucket `start`, ascending.
    ///
    /// For intervals coarser than [`Interval::finest`] the buckets are
    /// already folded with [`crate::aggregate::aggregate`] semantics. Fewer
    /// than `count` buckets are returned near the end of the dataset.
    fn fetch_range(
        &self,
        dataset: &str,
        interval: Interval,
        start: usize,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Candle>, SourceError>> + Send;
}

/// Slices `[start, start + count)` out of `buckets`, clamped to its length.
pub(crate) fn slice_range(buckets: &[Candle], start: usize, count: usize) -> Vec<Candle> {
    let begin = start.min(buckets.len());
    let end = start.saturating_add(count).min(buckets.len());
    buckets[begin..end].to_vec()
}
