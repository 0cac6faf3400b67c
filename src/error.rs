//! Crate-level error types.
//!
//! [`LookbackError`] unifies every error source (configuration, file I/O,
//! JSON, data source) behind a single enum so callers can match on the
//! variant they care about while still using the `?` operator for easy
//! propagation.

use crate::source::SourceError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LookbackError>;

/// Top-level error type returned by configuration, binary and tooling APIs.
///
/// Viewport operations return [`SourceError`] directly so data source
/// failures reach the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LookbackError {
    /// A configuration value is missing, unparsable, or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The data source rejected a request.
    #[error("data source error: {0}")]
    Source(#[from] SourceError),
}
