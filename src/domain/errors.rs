//! Domain errors for the magcat homogenisation pipeline.
//!
//! Only genuinely exceptional conditions are errors. Expected high-frequency
//! outcomes in real catalogues (a group with no eligible measure, a native
//! value no model covers) are values: `Option` results and
//! [`crate::domain::models::Provenance`] flags.

use thiserror::Error;

/// Domain-level errors that can occur in the magcat pipeline.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A pipeline stage was invoked before its prerequisite configuration
    /// was set. Fatal to the call, not to the instance.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Regression fitting was invoked with too few valid sample pairs.
    #[error("Insufficient data for regression: need at least {required} pairs, got {got}")]
    InsufficientData { required: usize, got: usize },

    /// The regression system of normal equations was singular, e.g. all
    /// native values identical.
    #[error("Regression failed: {0}")]
    RegressionFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A bulletin row could not be parsed during import.
    #[error("Import error at line {line}: {reason}")]
    Import { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
