//! Shared test utilities and constants.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use lookback::config::ViewportConfig;
use lookback::models::{Candle, Interval};
use lookback::source::{DataSource, MemorySource, SourceError};

/// 2024-01-01T00:00:00Z, aligned to every interval up to a day.
pub const BASE_EPOCH: i64 = 1_704_067_200;

/// Dataset id used by most tests.
pub const DATASET: &str = "BTC-USD";

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_EPOCH + offset_secs, 0).expect("timestamp in range")
}

/// `n` one-second candles with a slow sawtooth price and unit volume.
pub fn seconds(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let mid = 100.0 + (i % 50) as f64;
            Candle::new(at(i as i64), mid, mid + 1.0, mid - 1.0, mid + 0.5, 1.0)
        })
        .collect()
}

/// `n` one-second candles all trading inside `[low, high]`.
pub fn band(n: usize, low: f64, high: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle::new(at(i as i64), low, high, low, high, 1.0))
        .collect()
}

/// Viewport sizing with the default threshold and debounce.
pub fn config(buffer_size: usize, load_chunk_size: usize, max_buffer_size: usize) -> ViewportConfig {
    ViewportConfig {
        buffer_size,
        load_chunk_size,
        max_buffer_size,
        ..ViewportConfig::default()
    }
}

/// [`MemorySource`] wrapper that counts calls, yields before answering, and
/// can be told to fail or short-change the next fetch.
pub struct TestSource {
    inner: MemorySource,
    count_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetch_failure: Mutex<Option<SourceError>>,
    short_by: AtomicUsize,
}

impl TestSource {
    pub fn new() -> Self {
        Self {
            inner: MemorySource::new(),
            count_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fetch_failure: Mutex::new(None),
            short_by: AtomicUsize::new(0),
        }
    }

    pub fn with_dataset(dataset: &str, candles: Vec<Candle>) -> Self {
        let source = Self::new();
        source.inner.insert(dataset, candles);
        source
    }

    pub fn inner(&self) -> &MemorySource {
        &self.inner
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// The next `fetch_range` returns `error` instead of data.
    pub fn fail_next_fetch(&self, error: SourceError) {
        *self
            .fetch_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// The next `fetch_range` drops its last `n` candles.
    pub fn short_next_fetch(&self, n: usize) {
        self.short_by.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Option<SourceError> {
        self.fetch_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl DataSource for TestSource {
    async fn get_bucket_count(&self, dataset: &str, interval: Interval) -> Result<usize, SourceError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.inner.get_bucket_count(dataset, interval).await
    }

    async fn fetch_range(
        &self,
        dataset: &str,
        interval: Interval,
        start: usize,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let mut candles = self.inner.fetch_range(dataset, interval, start, count).await?;
        let short = self.short_by.swap(0, Ordering::SeqCst);
        candles.truncate(candles.len().saturating_sub(short));
        Ok(candles)
    }
}
