//! Vertical axis value ranges.
//!
//! [`ValueDomain`] tracks both the range of the currently loaded candles and
//! a stable range that only ever widens, so the axis does not jitter while
//! the user scrolls across regions of differing volatility.

use crate::models::Candle;

/// Fraction of the raw span added above and below the data.
pub const PADDING_RATIO: f64 = 0.05;

/// Lower bound on padding so flat data still yields a non-degenerate range.
pub const MIN_PADDING: f64 = 0.01;

/// A closed range `[low, high]` on the value axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

impl ValueRange {
    /// Creates a range, swapping the bounds if given in reverse.
    #[must_use]
    pub fn new(low: f64, high: f64) -> Self {
        if low <= high {
            Self { low, high }
        } else {
            Self { low: high, high: low }
        }
    }

    /// Padded range covering every low and high in `candles`.
    ///
    /// Returns `None` when there are no finite prices to cover.
    pub fn padded<'a>(candles: impl IntoIterator<Item = &'a Candle>) -> Option<Self> {
        let (min, max) = candles
            .into_iter()
            .flat_map(|candle| [candle.low, candle.high])
            .filter(|value| value.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
                (min.min(value), max.max(value))
            });
        if min > max {
            return None;
        }

        let padding = (PADDING_RATIO * (max - min)).max(MIN_PADDING);
        Some(Self {
            low: min - padding,
            high: max + padding,
        })
    }

    /// Distance between the bounds.
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    /// Smallest range covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }

    /// Returns `true` if `other` lies entirely within this range.
    pub fn covers(&self, other: &Self) -> bool {
        self.low <= other.low && self.high >= other.high
    }
}

/// Instantaneous and stable value ranges, updated together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueDomain {
    instantaneous: ValueRange,
    stable: ValueRange,
}

impl ValueDomain {
    /// Starts a new epoch with both ranges set to `seed`.
    #[must_use]
    pub fn new(seed: ValueRange) -> Self {
        Self {
            instantaneous: seed,
            stable: seed,
        }
    }

    /// Records the range of the current window and widens the stable range to cover it.
    pub fn update(&mut self, next: ValueRange) {
        self.instantaneous = next;
        self.stable = self.stable.union(next);
    }

    /// Range of the candles currently loaded.
    pub fn instantaneous(&self) -> ValueRange {
        self.instantaneous
    }

    /// Range the caller should render with.
    pub fn stable(&self) -> ValueRange {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn candle(low: f64, high: f64) -> Candle {
        Candle::new(DateTime::from_timestamp(0, 0).unwrap(), low, high, low, high, 1.0)
    }

    #[test]
    fn stable_range_only_grows() {
        let mut domain = ValueDomain::new(ValueRange::new(10.0, 20.0));

        domain.update(ValueRange::new(5.0, 15.0));
        assert_eq!(domain.stable(), ValueRange::new(5.0, 20.0));
        assert_eq!(domain.instantaneous(), ValueRange::new(5.0, 15.0));

        domain.update(ValueRange::new(18.0, 30.0));
        assert_eq!(domain.stable(), ValueRange::new(5.0, 30.0));
        assert_eq!(domain.instantaneous(), ValueRange::new(18.0, 30.0));
    }

    #[test]
    fn padding_is_five_percent_of_span() {
        let candles = [candle(100.0, 150.0), candle(120.0, 200.0)];
        let range = ValueRange::padded(&candles).unwrap();
        assert!((range.low - 95.0).abs() < 1e-9);
        assert!((range.high - 205.0).abs() < 1e-9);
    }

    #[test]
    fn flat_data_gets_minimum_padding() {
        let candles = [candle(42.0, 42.0)];
        let range = ValueRange::padded(&candles).unwrap();
        assert!((range.low - 41.99).abs() < 1e-9);
        assert!((range.high - 42.01).abs() < 1e-9);
        assert!(range.span() > 0.0);
    }

    #[test]
    fn no_candles_no_range() {
        assert!(ValueRange::padded(&[]).is_none());
    }

    #[test]
    fn new_orders_bounds() {
        let range = ValueRange::new(3.0, 1.0);
        assert_eq!(range.low, 1.0);
        assert_eq!(range.high, 3.0);
        assert!(range.covers(&ValueRange::new(1.5, 2.5)));
        assert!(!range.covers(&ValueRange::new(0.5, 2.5)));
    }
}
