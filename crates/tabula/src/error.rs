//! Error types for the Tabula library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Tabula operations.
#[derive(Debug, Error)]
pub enum TabulaError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Empty file or no data to model.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Invalid or missing configuration (field metadata, conditional specs).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A column holds values the declared type cannot encode.
    #[error("Unsupported type for field '{field}': {found}")]
    UnsupportedType { field: String, found: String },

    /// A statistical fit did not produce a usable model.
    #[error("Fit failed for {context}: {reason}")]
    FitFailure { context: String, reason: String },

    /// Sampling was requested from a model that has not been fitted.
    #[error("Model not fitted: {0}")]
    NotFitted(String),

    /// A field or channel referenced by the caller is absent from the model.
    #[error("Unknown field or channel: {0}")]
    UnknownField(String),

    /// `fit` was called on a model that already holds a fitted state.
    #[error("Model is already fitted")]
    AlreadyFitted,

    /// Column lengths or channel counts disagree.
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Error saving or loading a fitted model.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Coarse classification used by callers to pick a continuation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// File system and serialization failures.
    Io,
    /// Unsupported encoding kinds, malformed metadata or conditional specs.
    Configuration,
    /// No marginal passed goodness-of-fit, or correlation repair failed.
    FitFailure,
    /// Sampling before fit, or conditioning on an absent channel.
    SamplingPrecondition,
}

impl TabulaError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TabulaError::Io { .. }
            | TabulaError::Csv(_)
            | TabulaError::Json(_)
            | TabulaError::Persistence(_) => ErrorCategory::Io,
            TabulaError::EmptyData(_)
            | TabulaError::Config(_)
            | TabulaError::UnsupportedType { .. } => ErrorCategory::Configuration,
            TabulaError::FitFailure { .. } => ErrorCategory::FitFailure,
            TabulaError::NotFitted(_)
            | TabulaError::UnknownField(_)
            | TabulaError::AlreadyFitted
            | TabulaError::ShapeMismatch { .. } => ErrorCategory::SamplingPrecondition,
        }
    }

    /// Whether a partition-level caller may log this error and carry on.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::FitFailure
    }

    pub(crate) fn fit_failure(context: impl Into<String>, reason: impl Into<String>) -> Self {
        TabulaError::FitFailure {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Tabula operations.
pub type Result<T> = std::result::Result<T, TabulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistical_errors_distinct_from_io() {
        let io = TabulaError::Io {
            path: PathBuf::from("data.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let fit = TabulaError::fit_failure("partition 1-2", "no candidate passed");

        assert_eq!(io.category(), ErrorCategory::Io);
        assert_eq!(fit.category(), ErrorCategory::FitFailure);
        assert!(fit.is_recoverable());
        assert!(!io.is_recoverable());
        assert!(!TabulaError::NotFitted("copula".into()).is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = TabulaError::UnsupportedType {
            field: "age".into(),
            found: "text 'old'".into(),
        };
        assert_eq!(err.to_string(), "Unsupported type for field 'age': text 'old'");
    }
}
