//! Axis label formatting.
//!
//! Plain functions: the format is picked per call from the interval or the
//! value domain, so nothing is cached between calls.

use chrono::{DateTime, Utc};

use crate::models::{BaseUnit, Interval};
use crate::viewport::ValueRange;

/// Decimals used when the domain span gives no usable hint.
const FALLBACK_DECIMALS: usize = 2;

/// Upper bound on decimals for very narrow domains.
const MAX_DECIMALS: usize = 8;

/// Formats a bucket start for the time axis.
///
/// Second buckets show the time of day, minute and hour buckets add the
/// date, day and week buckets show only the date, and month buckets show
/// the year and month.
pub fn time_label(timestamp: DateTime<Utc>, interval: Interval) -> String {
    let pattern = match interval.base_unit() {
        BaseUnit::Second => "%H:%M:%S",
        BaseUnit::Minute | BaseUnit::Hour => "%m-%d %H:%M",
        BaseUnit::Day | BaseUnit::Week => "%Y-%m-%d",
        BaseUnit::Month => "%Y-%m",
    };
    timestamp.format(pattern).to_string()
}

/// Formats a value for the price axis with enough decimals to tell ticks
/// apart across `domain`.
pub fn price_label(value: f64, domain: ValueRange) -> String {
    let decimals = decimals_for_span(domain.span());
    format!("{value:.decimals$}")
}

/// Two significant digits below the magnitude of `span`.
fn decimals_for_span(span: f64) -> usize {
    if !span.is_finite() || span <= 0.0 {
        return FALLBACK_DECIMALS;
    }
    let magnitude = span.log10().floor();
    let decimals = (2.0 - magnitude).clamp(0.0, MAX_DECIMALS as f64);
    decimals as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn time_labels_follow_interval() {
        // 2024-01-15T10:30:05Z
        let ts = at(1_705_314_605);
        assert_eq!(time_label(ts, Interval::S1), "10:30:05");
        assert_eq!(time_label(ts, Interval::M5), "01-15 10:30");
        assert_eq!(time_label(ts, Interval::H4), "01-15 10:30");
        assert_eq!(time_label(ts, Interval::D1), "2024-01-15");
        assert_eq!(time_label(ts, Interval::W1), "2024-01-15");
        assert_eq!(time_label(ts, Interval::Mo1), "2024-01");
    }

    #[test]
    fn price_precision_follows_span() {
        assert_eq!(price_label(42_150.456, ValueRange::new(40_000.0, 45_000.0)), "42150");
        assert_eq!(price_label(42.4567, ValueRange::new(40.0, 45.0)), "42.46");
        assert_eq!(price_label(1.23456, ValueRange::new(1.2, 1.25)), "1.2346");
    }

    #[test]
    fn degenerate_span_uses_fallback() {
        assert_eq!(price_label(7.25678, ValueRange::new(7.0, 7.0)), "7.26");
    }

    #[test]
    fn narrow_span_is_capped() {
        assert_eq!(decimals_for_span(1e-12), MAX_DECIMALS);
    }
}
