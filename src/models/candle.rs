//! OHLCV candle model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV time bucket.
///
/// `sequence_index` is the candle's position inside the currently loaded
/// window. Data sources leave it at zero; the viewport assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Start of the bucket.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, skip_serializing)]
    pub sequence_index: usize,
}

impl Candle {
    /// Creates a candle with a zero sequence index.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            sequence_index: 0,
        }
    }

    /// Returns a copy of this candle placed at `index`.
    #[must_use]
    pub fn with_sequence_index(self, index: usize) -> Self {
        Self {
            sequence_index: index,
            ..self
        }
    }

    /// Seconds since the Unix epoch of the bucket start.
    pub fn epoch_seconds(&self) -> i64 {
        self.timestamp.timestamp()
    }

    /// Returns `true` if high/low bound open and close and volume is non-negative.
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close).max(self.low)
            && self.low <= self.open.min(self.close).min(self.high)
            && self.volume >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn consistent_candle() {
        let candle = Candle::new(at(0), 10.0, 12.0, 9.0, 11.0, 3.0);
        assert!(candle.is_consistent());
    }

    #[test]
    fn high_below_close_is_inconsistent() {
        let candle = Candle::new(at(0), 10.0, 10.5, 9.0, 11.0, 3.0);
        assert!(!candle.is_consistent());
    }

    #[test]
    fn negative_volume_is_inconsistent() {
        let candle = Candle::new(at(0), 10.0, 12.0, 9.0, 11.0, -1.0);
        assert!(!candle.is_consistent());
    }

    #[test]
    fn deserializes_without_sequence_index() {
        let json = r#"{"timestamp":"2024-01-15T10:30:00Z","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":7.0}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.sequence_index, 0);
        assert_eq!(candle.epoch_seconds(), 1_705_314_600);
        assert_eq!(candle.volume, 7.0);
    }

    #[test]
    fn sequence_index_is_not_serialized() {
        let candle = Candle::new(at(60), 1.0, 1.0, 1.0, 1.0, 1.0).with_sequence_index(42);
        let value = serde_json::to_value(candle).unwrap();
        assert!(value.get("sequence_index").is_none());
        assert_eq!(value["timestamp"], "1970-01-01T00:01:00Z");
    }
}
