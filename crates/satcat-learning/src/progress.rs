//! Progress reporting types for classifier training.
//!
//! This module defines [`TrainingStage`], [`ProgressUpdate`] and the
//! [`ProgressCallback`] type alias.
//!
//! # Example
//!
//! ```
//! use satcat_learning::{ProgressUpdate, Trainer};
//!
//! let trainer = Trainer::builder()
//!     .on_progress(|update: ProgressUpdate| {
//!         println!("[{}] {:.0}% - {}", update.stage.as_str(), update.progress * 100.0, update.message);
//!         if let Some((done, total)) = update.candidates_completed {
//!             println!("  Candidates: {}/{}", done, total);
//!         }
//!     })
//!     .build()
//!     .expect("valid config");
//! ```

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

/// The current stage of training.
///
/// Training progresses through these stages in order (unless it fails):
///
/// 1. [`Preprocessing`](Self::Preprocessing) - Imputing, encoding, splitting and scaling
/// 2. [`Searching`](Self::Searching) - Cross-validating the parameter grid
/// 3. [`Training`](Self::Training) - Refitting the best candidate on the training split
/// 4. [`Evaluating`](Self::Evaluating) - Scoring the test split
/// 5. [`Persisting`](Self::Persisting) - Writing model artifacts
/// 6. [`Complete`](Self::Complete) - Training finished successfully
///
/// This enum is marked `#[non_exhaustive]` to allow adding new stages in future versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TrainingStage {
    #[default]
    Preprocessing,
    Searching,
    Training,
    Evaluating,
    Persisting,
    /// Terminal. The training result is available.
    Complete,
    /// Terminal. Check the returned error for details.
    Failed,
}

impl TrainingStage {
    /// Returns the snake_case name of the stage.
    ///
    /// # Examples
    ///
    /// ```
    /// use satcat_learning::TrainingStage;
    ///
    /// assert_eq!(TrainingStage::Searching.as_str(), "searching");
    /// ```
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Preprocessing => "preprocessing",
            TrainingStage::Searching => "searching",
            TrainingStage::Training => "training",
            TrainingStage::Evaluating => "evaluating",
            TrainingStage::Persisting => "persisting",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStage::Complete | TrainingStage::Failed)
    }
}

/// Error type for parsing a [`TrainingStage`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTrainingStageError {
    invalid_value: String,
}

impl ParseTrainingStageError {
    /// Returns the invalid value that caused the parse error.
    #[must_use]
    pub fn invalid_value(&self) -> &str {
        &self.invalid_value
    }
}

impl std::fmt::Display for ParseTrainingStageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid training stage: '{}'. Valid values are: preprocessing, searching, \
             training, evaluating, persisting, complete, failed",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseTrainingStageError {}

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preprocessing" => Ok(TrainingStage::Preprocessing),
            "searching" => Ok(TrainingStage::Searching),
            "training" => Ok(TrainingStage::Training),
            "evaluating" => Ok(TrainingStage::Evaluating),
            "persisting" => Ok(TrainingStage::Persisting),
            "complete" => Ok(TrainingStage::Complete),
            "failed" => Ok(TrainingStage::Failed),
            _ => Err(ParseTrainingStageError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A progress update sent to the [`ProgressCallback`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProgressUpdate {
    /// The current training stage.
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0.
    pub progress: f64,

    /// Human-readable status message.
    pub message: String,

    /// Grid candidates cross-validated so far and in total: `(completed, total)`.
    ///
    /// Only populated during [`Searching`](TrainingStage::Searching).
    pub candidates_completed: Option<(usize, usize)>,
}

impl ProgressUpdate {
    /// Create an update without candidate counts.
    #[must_use]
    pub fn new(stage: TrainingStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            candidates_completed: None,
        }
    }
}

/// Type alias for a progress callback function.
///
/// Callbacks must be thread-safe (`Send + Sync`) as grid-search workers
/// report from their own threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use satcat_learning::{ProgressCallback, ProgressUpdate};
///
/// let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
///     println!("[{:?}] {} - {}", update.stage, update.progress, update.message);
/// });
/// ```
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_stage_as_str() {
        assert_eq!(TrainingStage::Preprocessing.as_str(), "preprocessing");
        assert_eq!(TrainingStage::Searching.as_str(), "searching");
        assert_eq!(TrainingStage::Training.as_str(), "training");
        assert_eq!(TrainingStage::Evaluating.as_str(), "evaluating");
        assert_eq!(TrainingStage::Persisting.as_str(), "persisting");
        assert_eq!(TrainingStage::Complete.as_str(), "complete");
        assert_eq!(TrainingStage::Failed.as_str(), "failed");
    }

    #[test]
    fn test_training_stage_round_trip() {
        for stage in [
            TrainingStage::Preprocessing,
            TrainingStage::Searching,
            TrainingStage::Training,
            TrainingStage::Evaluating,
            TrainingStage::Persisting,
            TrainingStage::Complete,
            TrainingStage::Failed,
        ] {
            assert_eq!(stage.as_str().parse::<TrainingStage>(), Ok(stage));
        }
    }

    #[test]
    fn test_training_stage_parse_error() {
        let err = "cancelled".parse::<TrainingStage>().unwrap_err();
        assert_eq!(err.invalid_value(), "cancelled");
        assert!(err.to_string().contains("searching"));
    }

    #[test]
    fn test_is_terminal() {
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Failed.is_terminal());
        assert!(!TrainingStage::Searching.is_terminal());
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(ProgressUpdate::new(TrainingStage::Training, 1.5, "x").progress, 1.0);
        assert_eq!(ProgressUpdate::new(TrainingStage::Training, -0.1, "x").progress, 0.0);
    }

    #[test]
    fn test_serialize_stage() {
        let update = ProgressUpdate::new(TrainingStage::Searching, 0.5, "cv");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["stage"], "searching");
        assert_eq!(json["candidates_completed"], serde_json::Value::Null);
    }
}
