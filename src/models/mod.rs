//! Shared value types for candle data.
//!
//! Contains the [`Candle`] bucket and the ordered set of supported
//! aggregation [`Interval`]s.

pub mod candle;
pub mod interval;

pub use candle::Candle;
pub use interval::{BaseUnit, Interval, UnknownInterval};
