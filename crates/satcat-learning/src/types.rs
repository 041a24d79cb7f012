//! Common types used throughout the satcat-learning crate.
//!
//! # Overview
//!
//! - [`TrainingResult`]: Complete result from [`Trainer::train()`](crate::Trainer::train)
//! - [`Metrics`]: Test-split evaluation metrics
//! - [`CandidateScore`]: Cross-validation score of one grid candidate
//! - [`PredictionRequest`]: The seven model inputs accepted by the API
//! - [`FeatureRecord`]: Feature values keyed by name
//! - [`Prediction`]: Response body of a prediction

use std::collections::BTreeMap;

use satcat_processing::StatusLabel;
use serde::{Deserialize, Serialize};

use crate::forest::ForestParams;

/// Result of a training run.
///
/// Persisted alongside the model as `training_report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Grid candidate with the best mean cross-validated macro-F1.
    pub best_params: ForestParams,

    /// Mean macro-F1 of `best_params` across the CV folds.
    pub cv_score: f64,

    /// Every candidate in grid order.
    pub candidates: Vec<CandidateScore>,

    /// Scores of the refit model on the test split.
    pub metrics: Metrics,

    /// `(feature, importance)` pairs sorted by descending importance.
    pub feature_importance: Vec<(String, f64)>,

    pub train_rows: usize,
    pub test_rows: usize,

    /// Status labels in class-index order.
    pub classes: Vec<StatusLabel>,

    pub training_time_seconds: f64,

    /// Non-fatal warnings generated during training.
    pub warnings: Vec<String>,
}

/// Cross-validation score of one grid candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

/// Test-split evaluation metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub macro_f1: f64,
    /// Rows are true classes, columns predicted classes, both in
    /// class-index order.
    pub confusion_matrix: Vec<Vec<usize>>,
    pub per_class: Vec<ClassReport>,
}

/// Precision, recall and F1 of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of test rows of this class.
    pub support: usize,
}

/// One feature value as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

/// Feature values keyed by feature name.
pub type FeatureRecord = BTreeMap<String, FeatureValue>;

/// Input of one prediction.
///
/// All seven fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionRequest {
    pub total_mass: f64,
    pub span: f64,
    pub period_mins: f64,
    pub perigee_km: f64,
    pub apogee_km: f64,
    pub inclination: f64,
    pub object_type: String,
}

impl PredictionRequest {
    /// The request as a [`FeatureRecord`].
    #[must_use]
    pub fn to_record(&self) -> FeatureRecord {
        let mut record = FeatureRecord::new();
        record.insert("total_mass".into(), self.total_mass.into());
        record.insert("span".into(), self.span.into());
        record.insert("period_mins".into(), self.period_mins.into());
        record.insert("perigee_km".into(), self.perigee_km.into());
        record.insert("apogee_km".into(), self.apogee_km.into());
        record.insert("inclination".into(), self.inclination.into());
        record.insert("object_type".into(), self.object_type.as_str().into());
        record
    }
}

/// Response body of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: StatusLabel,
}
