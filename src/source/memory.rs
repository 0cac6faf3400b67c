//! In-memory data source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use super::{DataSource, SourceError, slice_range};
use crate::aggregate::aggregate;
use crate::models::{Candle, Interval};

/// Buckets folded from one version of a dataset.
struct Folded {
    raw: Arc<Vec<Candle>>,
    buckets: Arc<Vec<Candle>>,
}

/// Datasets of finest-grained candles held in memory.
///
/// Coarser intervals are folded on first request and cached until the
/// dataset is replaced. A cached fold is only served while it was built from
/// the dataset's current raw candles.
pub struct MemorySource {
    datasets: RwLock<HashMap<String, Arc<Vec<Candle>>>>,
    aggregated: Mutex<HashMap<(String, Interval), Folded>>,
    connected: AtomicBool,
}

impl MemorySource {
    /// Creates an empty, connected source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(HashMap::new()),
            aggregated: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Adds or replaces a dataset of ascending finest-grained candles.
    pub fn insert(&self, dataset: impl Into<String>, candles: Vec<Candle>) {
        let dataset = dataset.into();
        self.datasets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dataset.clone(), Arc::new(candles));
        self.forget_aggregates(&dataset);
    }

    /// Removes a dataset. Returns `true` if it existed.
    pub fn remove(&self, dataset: &str) -> bool {
        let removed = self
            .datasets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(dataset)
            .is_some();
        self.forget_aggregates(dataset);
        removed
    }

    /// Simulates the backend going away or coming back.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn forget_aggregates(&self, dataset: &str) {
        self.aggregated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(name, _), _| name != dataset);
    }

    /// Returns every bucket of `dataset` at `interval`.
    fn buckets(&self, dataset: &str, interval: Interval) -> Result<Arc<Vec<Candle>>, SourceError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SourceError::NotConnected);
        }

        let raw = self
            .datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dataset)
            .cloned()
            .ok_or_else(|| SourceError::DatasetMissing(dataset.to_string()))?;

        if interval.is_finest() {
            return Ok(raw);
        }

        let mut cache = self.aggregated.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (dataset.to_string(), interval);
        if let Some(folded) = cache.get(&key)
            && Arc::ptr_eq(&folded.raw, &raw)
        {
            return Ok(Arc::clone(&folded.buckets));
        }

        let buckets = Arc::new(aggregate(&raw, interval.seconds()));
        debug!(
            dataset,
            %interval,
            raw = raw.len(),
            buckets = buckets.len(),
            "aggregated dataset"
        );
        cache.insert(
            key,
            Folded {
                raw,
                buckets: Arc::clone(&buckets),
            },
        );
        Ok(buckets)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for MemorySource {
    async fn get_bucket_count(&self, dataset: &str, interval: Interval) -> Result<usize, SourceError> {
        Ok(self.buckets(dataset, interval)?.len())
    }

    async fn fetch_range(
        &self,
        dataset: &str,
        interval: Interval,
        start: usize,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let buckets = self.buckets(dataset, interval)?;
        Ok(slice_range(&buckets, start, count))
    }
}
