//! OHLCV re-aggregation into coarser buckets.
//!
//! Folding follows candle semantics rather than averaging: the first open
//! and last close of a bucket survive, highs and lows are extremes, and
//! volumes add up.

use std::collections::BTreeMap;

use chrono::DateTime;

use crate::models::Candle;

/// Folds `candles` into buckets `interval_seconds` wide.
///
/// A candle belongs to the bucket starting at
/// `floor(epoch_seconds / interval_seconds) * interval_seconds`. Within a
/// bucket, open and close come from the first and last candle in arrival
/// order. Only non-empty buckets are emitted, in ascending time order, with
/// sequence indices renumbered from zero.
///
/// A non-positive `interval_seconds` yields no buckets.
pub fn aggregate(candles: &[Candle], interval_seconds: i64) -> Vec<Candle> {
    if interval_seconds <= 0 || candles.is_empty() {
        return Vec::new();
    }

    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for candle in candles {
        let start = bucket_start(candle.epoch_seconds(), interval_seconds);
        buckets
            .entry(start)
            .and_modify(|bucket| {
                bucket.high = bucket.high.max(candle.high);
                bucket.low = bucket.low.min(candle.low);
                bucket.close = candle.close;
                bucket.volume += candle.volume;
            })
            .or_insert_with(|| Candle {
                timestamp: DateTime::from_timestamp(start, 0).unwrap_or(candle.timestamp),
                ..*candle
            });
    }

    buckets
        .into_values()
        .enumerate()
        .map(|(index, candle)| candle.with_sequence_index(index))
        .collect()
}

/// Start of the bucket containing `epoch_seconds`, flooring toward negative infinity.
pub fn bucket_start(epoch_seconds: i64, interval_seconds: i64) -> i64 {
    epoch_seconds.div_euclid(interval_seconds) * interval_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn second_candle(secs: i64, price: f64, volume: f64) -> Candle {
        Candle::new(
            DateTime::from_timestamp(secs, 0).unwrap(),
            price,
            price + 2.0,
            price - 2.0,
            price + 1.0,
            volume,
        )
    }

    #[test]
    fn folds_single_bucket() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| second_candle(i, 100.0 + (i % 7) as f64, 1.5))
            .collect();

        let out = aggregate(&candles, 60);

        assert_eq!(out.len(), 1);
        let bucket = out[0];
        assert_eq!(bucket.open, candles[0].open);
        assert_eq!(bucket.close, candles[59].close);
        assert_eq!(bucket.high, 108.0);
        assert_eq!(bucket.low, 98.0);
        assert!((bucket.volume - 90.0).abs() < 1e-9);
        assert_eq!(bucket.epoch_seconds(), 0);
    }

    #[test]
    fn partial_final_bucket() {
        let candles: Vec<Candle> = (0..90).map(|i| second_candle(i, 10.0, 1.0)).collect();

        let out = aggregate(&candles, 60);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].volume, 60.0);
        assert_eq!(out[1].volume, 30.0);
        assert_eq!(out[1].epoch_seconds(), 60);
    }

    #[test]
    fn unaligned_input_floors_to_boundary() {
        let candles = vec![second_candle(119, 5.0, 1.0), second_candle(121, 6.0, 1.0)];

        let out = aggregate(&candles, 60);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].epoch_seconds(), 60);
        assert_eq!(out[1].epoch_seconds(), 120);
    }

    #[test]
    fn skips_empty_buckets() {
        let candles = vec![second_candle(0, 1.0, 1.0), second_candle(600, 1.0, 1.0)];

        let out = aggregate(&candles, 60);

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].epoch_seconds(), 600);
    }

    #[test]
    fn non_positive_interval_is_empty() {
        let candles: Vec<Candle> = (0..10).map(|i| second_candle(i, 1.0, 1.0)).collect();
        assert!(aggregate(&candles, 0).is_empty());
        assert!(aggregate(&candles, -60).is_empty());
    }

    #[test]
    fn negative_timestamps_floor_down() {
        assert_eq!(bucket_start(-1, 60), -60);
        assert_eq!(bucket_start(59, 60), 0);
    }
}
