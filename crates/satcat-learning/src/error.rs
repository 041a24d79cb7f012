//! Error types for the satcat-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Example
//!
//! ```
//! use satcat_learning::{LearningError, TrainingConfig};
//!
//! fn configure() -> Result<TrainingConfig, LearningError> {
//!     // Errors are automatically propagated with ?
//!     let config = TrainingConfig::builder().test_size(0.25).build()?;
//!     Ok(config)
//! }
//! ```

use satcat_processing::ProcessingError;
use thiserror::Error;

/// The main error type for training and serving.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to the trainer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for training or prediction.
    ///
    /// Common causes:
    /// - Too few rows to split into train, test and CV folds
    /// - A feature column without a single value to impute from
    /// - Text supplied for a numeric feature
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A feature the model needs is absent from the input.
    #[error("Feature '{0}' is missing")]
    MissingFeature(String),

    /// A target value has no entry in the status mapping.
    #[error("Target value '{0}' is not in the status mapping")]
    UnmappedTarget(String),

    /// A fitted component was used before fitting or with the wrong shape.
    #[error("{0} has not been fitted")]
    ModelNotFitted(String),

    /// Reading or writing an artifact failed.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ProcessingError),

    /// Polars error while extracting the training columns.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::MissingFeature(_) => "MISSING_FEATURE",
            Self::UnmappedTarget(_) => "UNMAPPED_TARGET",
            Self::ModelNotFitted(_) => "MODEL_NOT_FITTED",
            Self::Artifact(e) => e.error_code(),
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the error was caused by the caller's input rather than by
    /// the model or its artifacts.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidData(_) | Self::MissingFeature(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LearningError::MissingFeature("span".to_string());
        assert_eq!(err.to_string(), "Feature 'span' is missing");

        let err = LearningError::UnmappedTarget("ZZ".to_string());
        assert!(err.to_string().contains("ZZ"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LearningError::InvalidData("x".into()).error_code(),
            "INVALID_DATA"
        );
        let artifact = LearningError::from(ProcessingError::ArtifactNotFound("scaler".into()));
        assert_eq!(artifact.error_code(), "ARTIFACT_NOT_FOUND");
    }

    #[test]
    fn test_input_errors() {
        assert!(LearningError::MissingFeature("span".into()).is_input_error());
        assert!(LearningError::InvalidData("text".into()).is_input_error());
        assert!(!LearningError::ModelNotFitted("scaler".into()).is_input_error());
    }
}
