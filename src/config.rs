//! Application configuration loaded from environment variables.
//!
//! Every setting is optional:
//! - `LOOKBACK_DATA_DIR`: directory of `<dataset>.jsonl` files (default `data`)
//! - `LOOKBACK_BUFFER_SIZE`: candles per full load (default 300)
//! - `LOOKBACK_LOAD_CHUNK`: candles per extension (default: buffer size)
//! - `LOOKBACK_MAX_BUFFER`: window capacity (default: twice the buffer size)
//! - `LOOKBACK_EDGE_THRESHOLD`: look-ahead in candles before an edge fetch (default 50)
//! - `LOOKBACK_DEBOUNCE_MS`: scroll debounce in milliseconds (default 60)
//! - `LOOKBACK_INTERVAL`: initial interval label (default `1s`)
//! - `LOOKBACK_POLL_MS`: directory watcher poll period (default 1000)

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Interval;

/// Candles fetched by a full load.
pub const DEFAULT_BUFFER_SIZE: usize = 300;

/// Look-ahead, in candles, before the driver extends the window.
pub const DEFAULT_EDGE_THRESHOLD: usize = 50;

/// Quiet period before a scroll position is acted on.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(60);

/// Period between directory scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_DATA_DIR: &str = "data";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub viewport: ViewportConfig,
}

/// Sizing and timing of a viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    /// Candles fetched by `load_initial`, `set_interval` and `reload`.
    pub buffer_size: usize,
    /// Candles fetched by each `extend_start`/`extend_end`.
    pub load_chunk_size: usize,
    /// Upper bound on the window length.
    pub max_buffer_size: usize,
    pub edge_threshold: usize,
    pub debounce: Duration,
    pub default_interval: Interval,
}

impl ViewportConfig {
    /// Derives chunk and capacity defaults from `buffer_size`.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            load_chunk_size: buffer_size,
            max_buffer_size: buffer_size.saturating_mul(2),
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            debounce: DEFAULT_DEBOUNCE,
            default_interval: Interval::finest(),
        }
    }

    /// Checks that the sizes are usable together.
    ///
    /// # Errors
    ///
    /// Returns [`LookbackError::Config`](crate::LookbackError::Config) if a
    /// size is zero or a fetch could not fit in the window.
    pub fn validate(&self) -> crate::Result<()> {
        if self.buffer_size == 0 {
            return Err(crate::LookbackError::Config(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.load_chunk_size == 0 {
            return Err(crate::LookbackError::Config(
                "load_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.buffer_size > self.max_buffer_size {
            return Err(crate::LookbackError::Config(format!(
                "buffer_size {} exceeds max_buffer_size {}",
                self.buffer_size, self.max_buffer_size
            )));
        }
        if self.load_chunk_size > self.max_buffer_size {
            return Err(crate::LookbackError::Config(format!(
                "load_chunk_size {} exceeds max_buffer_size {}",
                self.load_chunk_size, self.max_buffer_size
            )));
        }
        Ok(())
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`LookbackError::Config`](crate::LookbackError::Config) if a
/// variable cannot be parsed or the resulting sizes are inconsistent.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let data_dir = non_empty_var("LOOKBACK_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

    let buffer_size = parse_var("LOOKBACK_BUFFER_SIZE")?.unwrap_or(DEFAULT_BUFFER_SIZE);
    let mut viewport = ViewportConfig::new(buffer_size);
    if let Some(chunk) = parse_var("LOOKBACK_LOAD_CHUNK")? {
        viewport.load_chunk_size = chunk;
    }
    if let Some(max) = parse_var("LOOKBACK_MAX_BUFFER")? {
        viewport.max_buffer_size = max;
    }
    if let Some(threshold) = parse_var("LOOKBACK_EDGE_THRESHOLD")? {
        viewport.edge_threshold = threshold;
    }
    if let Some(ms) = parse_var::<u64>("LOOKBACK_DEBOUNCE_MS")? {
        viewport.debounce = Duration::from_millis(ms);
    }
    if let Some(interval) = parse_var::<Interval>("LOOKBACK_INTERVAL")? {
        viewport.default_interval = interval;
    }
    viewport.validate()?;

    let poll_interval = parse_var::<u64>("LOOKBACK_POLL_MS")?
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_POLL_INTERVAL);

    Ok(AppConfig {
        data_dir: PathBuf::from(data_dir),
        poll_interval,
        viewport,
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parses a non-empty environment variable.
fn parse_var<T>(name: &str) -> crate::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| crate::LookbackError::Config(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}
