//! Aggregation intervals.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
/// Calendar months are approximated as 30 days.
const MONTH: i64 = 30 * DAY;

/// Calendar unit an interval is a multiple of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

/// Supported candle granularities, declared (and therefore ordered) by duration.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Interval {
    #[default]
    #[serde(rename = "1s")]
    S1,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

impl Interval {
    /// All intervals in ascending duration order.
    pub const ALL: [Interval; 15] = [
        Self::S1,
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H12,
        Self::D1,
        Self::D3,
        Self::W1,
        Self::Mo1,
    ];

    /// The granularity raw datasets are stored at.
    pub fn finest() -> Self {
        Self::S1
    }

    /// Returns `true` if this is the raw, unaggregated granularity.
    pub fn is_finest(&self) -> bool {
        *self == Self::finest()
    }

    /// Returns the display label, which is also the parse and serde form.
    pub fn label(&self) -> &'static str {
        match self {
            Interval::S1 => "1s",
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
            Interval::Mo1 => "1M",
        }
    }

    /// Canonical bucket duration in seconds.
    pub fn seconds(&self) -> i64 {
        self.multiplier()
            * match self.base_unit() {
                BaseUnit::Second => 1,
                BaseUnit::Minute => MINUTE,
                BaseUnit::Hour => HOUR,
                BaseUnit::Day => DAY,
                BaseUnit::Week => WEEK,
                BaseUnit::Month => MONTH,
            }
    }

    /// Unit half of the "base unit + multiplier" decomposition.
    pub fn base_unit(&self) -> BaseUnit {
        match self {
            Interval::S1 => BaseUnit::Second,
            Interval::M1 | Interval::M3 | Interval::M5 | Interval::M15 | Interval::M30 => {
                BaseUnit::Minute
            }
            Interval::H1 | Interval::H2 | Interval::H4 | Interval::H6 | Interval::H12 => {
                BaseUnit::Hour
            }
            Interval::D1 | Interval::D3 => BaseUnit::Day,
            Interval::W1 => BaseUnit::Week,
            Interval::Mo1 => BaseUnit::Month,
        }
    }

    /// Multiplier half of the "base unit + multiplier" decomposition.
    pub fn multiplier(&self) -> i64 {
        match self {
            Interval::S1
            | Interval::M1
            | Interval::H1
            | Interval::D1
            | Interval::W1
            | Interval::Mo1 => 1,
            Interval::H2 => 2,
            Interval::M3 | Interval::D3 => 3,
            Interval::H4 => 4,
            Interval::M5 => 5,
            Interval::H6 => 6,
            Interval::H12 => 12,
            Interval::M15 => 15,
            Interval::M30 => 30,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a label does not name a supported interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interval: {0}")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.label() == s)
            .ok_or_else(|| UnknownInterval(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_duration() {
        for pair in Interval::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].seconds() < pair[1].seconds());
        }
    }

    #[test]
    fn decomposition_matches_seconds() {
        assert_eq!(Interval::M3.base_unit(), BaseUnit::Minute);
        assert_eq!(Interval::M3.multiplier(), 3);
        assert_eq!(Interval::M3.seconds(), 180);
        assert_eq!(Interval::H12.seconds(), 43_200);
        assert_eq!(Interval::Mo1.seconds(), 2_592_000);
    }

    #[test]
    fn parses_labels() {
        for interval in Interval::ALL {
            assert_eq!(interval.label().parse::<Interval>(), Ok(interval));
        }
        assert_eq!("1M".parse::<Interval>(), Ok(Interval::Mo1));
        assert_eq!("1m".parse::<Interval>(), Ok(Interval::M1));
    }

    #[test]
    fn rejects_unknown_label() {
        let err = "7m".parse::<Interval>().unwrap_err();
        assert_eq!(err.to_string(), "unknown interval: 7m");
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&Interval::H4).unwrap();
        assert_eq!(json, "\"4h\"");
        let parsed: Interval = serde_json::from_str("\"1w\"").unwrap();
        assert_eq!(parsed, Interval::W1);
    }

    #[test]
    fn finest_is_one_second() {
        assert!(Interval::S1.is_finest());
        assert!(!Interval::M1.is_finest());
        assert_eq!(Interval::default(), Interval::finest());
    }
}
