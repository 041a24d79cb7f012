//! Error types for the catalog build pipeline.
//!
//! Row-level anomalies (an unparseable date, an unrecognized designation)
//! never surface here: they degrade to missing or pass-through values.
//! What does surface are table-level failures such as a source file that
//! lacks a required column, and build-level failures such as a status code
//! that no longer maps into the closed status set.
//!
//! Errors serialize as `{code, message}` so the HTTP layer can hand them
//! straight to clients.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the catalog build pipeline.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A source table lacks a column the reconciliation depends on.
    #[error("Source '{source_name}' is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    /// Column was not found in a table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// Status values left outside the closed status set after mapping.
    #[error("Unmapped status values after merge: {}", .0.join(", "))]
    UnmappedStatus(Vec<String>),

    /// A named artifact does not exist in the artifact directory.
    #[error("Artifact '{0}' not found")]
    ArtifactNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source file could not be loaded into a table.
    #[error("Failed to load '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    /// Columns of unequal length were assembled into one table.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for [`ProcessingError::MissingColumn`].
    pub fn missing_column(source: impl Into<String>, column: impl Into<String>) -> Self {
        ProcessingError::MissingColumn {
            source_name: source.into(),
            column: column.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumn { .. } => "MISSING_COLUMN",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::UnmappedStatus(_) => "UNMAPPED_STATUS",
            Self::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::LoadFailed { .. } => "LOAD_FAILED",
            Self::LengthMismatch { .. } => "LENGTH_MISMATCH",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the failure is confined to one source table.
    pub fn is_table_level(&self) -> bool {
        match self {
            Self::MissingColumn { .. } | Self::LoadFailed { .. } => true,
            Self::WithContext { source, .. } => source.is_table_level(),
            _ => false,
        }
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Io(e).with_context(context))
    }
}
