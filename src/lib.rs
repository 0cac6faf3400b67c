//! Scrollable viewport over large OHLCV datasets.
//!
//! Keeps a bounded window of candles from a dataset that may hold millions
//! of buckets, extends it as the user scrolls toward either edge, and
//! re-aggregates on interval changes. The rendering layer only ever sees a
//! [`viewport::WindowSnapshot`] and a scroll correction.

pub mod aggregate;
pub mod config;
pub mod driver;
pub mod error;
pub mod format;
pub mod models;
pub mod source;
pub mod viewport;
pub mod watch;

pub use error::{LookbackError, Result};
