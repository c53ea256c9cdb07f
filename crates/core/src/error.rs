//! Error types for the resampler.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the resampler.
#[derive(Error, Debug)]
pub enum Error {
    /// Input is not a recognized tabular object.
    #[error("X is not a data frame: {0}")]
    InputType(String),

    /// Input lacks the datetime index required for bucketing.
    #[error("X does not have a datetime index: {0}")]
    IndexType(String),

    /// Invalid or unsupported resampling frequency.
    #[error("Frequency error: {0}")]
    Frequency(String),

    /// A referenced column or index level does not exist.
    #[error("Column not found: {0}")]
    MissingColumn(String),

    /// A value column cannot be aggregated numerically.
    #[error("Column is not numeric: {0}")]
    NonNumericColumn(String),

    /// Data error (malformed or inconsistent table).
    #[error("Data error: {0}")]
    Data(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an input type error.
    pub fn input_type(msg: impl Into<String>) -> Self {
        Error::InputType(msg.into())
    }

    /// Create an index type error.
    pub fn index_type(msg: impl Into<String>) -> Self {
        Error::IndexType(msg.into())
    }

    /// Create a frequency error.
    pub fn frequency(msg: impl Into<String>) -> Self {
        Error::Frequency(msg.into())
    }

    /// Create a missing column error.
    pub fn missing_column(name: impl Into<String>) -> Self {
        Error::MissingColumn(name.into())
    }

    /// Create a non-numeric column error.
    pub fn non_numeric(name: impl Into<String>) -> Self {
        Error::NonNumericColumn(name.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error comes from input validation and is therefore
    /// subject to the configured error policy.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InputType(_) | Error::IndexType(_))
    }
}
