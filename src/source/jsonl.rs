//! JSON-lines file data source.
//!
//! Each dataset is a `<dataset>.jsonl` file inside the source directory,
//! holding one finest-grained [`Candle`] per line in ascending time order:
//!
//! ```text
//! {"timestamp":"2024-01-15T10:30:00Z","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":7.0}
//! ```

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{DataSource, SourceError, slice_range};
use crate::aggregate::aggregate;
use crate::models::{Candle, Interval};

/// File extension of dataset files.
pub const DATASET_EXTENSION: &str = "jsonl";

/// A parsed dataset file and the aggregations derived from it.
struct CachedFile {
    modified: Option<SystemTime>,
    raw: Arc<Vec<Candle>>,
    aggregated: HashMap<Interval, Arc<Vec<Candle>>>,
}

/// Reads datasets from a directory of JSON-lines files.
///
/// Parsed files are cached and re-read when their modification time changes.
pub struct JsonlSource {
    root: PathBuf,
    cache: Mutex<HashMap<String, CachedFile>>,
}

impl JsonlSource {
    /// Creates a source rooted at `root`. The directory is not touched until
    /// the first request.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Directory datasets are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `dataset`.
    pub fn dataset_path(&self, dataset: &str) -> PathBuf {
        self.root.join(format!("{dataset}.{DATASET_EXTENSION}"))
    }

    async fn buckets(&self, dataset: &str, interval: Interval) -> Result<Arc<Vec<Candle>>, SourceError> {
        if dataset.is_empty() || dataset.contains(['/', '\\']) || dataset.starts_with('.') {
            return Err(SourceError::DataError(format!("invalid dataset id: {dataset:?}")));
        }
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(SourceError::NotConnected);
        }

        let path = self.dataset_path(dataset);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::DatasetMissing(dataset.to_string()));
            }
            Err(e) => {
                return Err(SourceError::DataError(format!("{}: {e}", path.display())));
            }
        };
        let modified = metadata.modified().ok();

        let mut cache = self.cache.lock().await;
        let stale = cache
            .get(dataset)
            .is_none_or(|cached| cached.modified.is_none() || cached.modified != modified);
        if stale {
            let raw = read_dataset(&path).await?;
            info!(dataset, candles = raw.len(), "loaded dataset file");
            cache.insert(
                dataset.to_string(),
                CachedFile {
                    modified,
                    raw: Arc::new(raw),
                    aggregated: HashMap::new(),
                },
            );
        }

        let Some(cached) = cache.get_mut(dataset) else {
            return Err(SourceError::DatasetMissing(dataset.to_string()));
        };
        if interval.is_finest() {
            return Ok(Arc::clone(&cached.raw));
        }
        let raw = Arc::clone(&cached.raw);
        let buckets = cached
            .aggregated
            .entry(interval)
            .or_insert_with(|| {
                debug!(dataset, %interval, "aggregating dataset file");
                Arc::new(aggregate(&raw, interval.seconds()))
            });
        Ok(Arc::clone(buckets))
    }
}

impl DataSource for JsonlSource {
    async fn get_bucket_count(&self, dataset: &str, interval: Interval) -> Result<usize, SourceError> {
        Ok(self.buckets(dataset, interval).await?.len())
    }

    async fn fetch_range(
        &self,
        dataset: &str,
        interval: Interval,
        start: usize,
        count: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let buckets = self.buckets(dataset, interval).await?;
        Ok(slice_range(&buckets, start, count))
    }
}

/// Parses a dataset file, rejecting malformed or out-of-order lines.
async fn read_dataset(path: &Path) -> Result<Vec<Candle>, SourceError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(SourceError::DatasetMissing(name));
        }
        Err(e) => return Err(SourceError::DataError(format!("{}: {e}", path.display()))),
    };

    let mut candles: Vec<Candle> = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let candle: Candle = serde_json::from_str(line).map_err(|e| {
            SourceError::DataError(format!("{}:{}: {e}", path.display(), number + 1))
        })?;
        if let Some(previous) = candles.last()
            && candle.timestamp < previous.timestamp
        {
            return Err(SourceError::DataError(format!(
                "{}:{}: timestamp {} precedes {}",
                path.display(),
                number + 1,
                candle.timestamp,
                previous.timestamp
            )));
        }
        candles.push(candle);
    }

    Ok(candles)
}
