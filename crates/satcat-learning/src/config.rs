//! Configuration types for classifier training.
//!
//! This module provides [`TrainingConfig`] and its builder, as well as the
//! [`ParamGrid`] searched during cross-validation.
//!
//! # Example
//!
//! ```
//! use satcat_learning::TrainingConfig;
//!
//! let config = TrainingConfig::builder()
//!     .cv_folds(5)
//!     .test_size(0.25)
//!     .n_jobs(2)
//!     .build()
//!     .expect("valid config");
//! ```

use std::num::NonZeroUsize;

use satcat_processing::MODEL_FEATURES;
use serde::{Deserialize, Serialize};

use crate::error::LearningError;
use crate::forest::{ClassWeight, ForestParams};

/// Hyperparameter values tried by the grid search.
///
/// Every combination of the five lists is one candidate. Candidates are
/// enumerated with parameter names in alphabetical order and the last name
/// varying fastest, so `n_estimators` changes between neighbours and
/// `class_weight` changes least often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    /// `None` grows every tree until its leaves are pure.
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub class_weight: Vec<ClassWeight>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
            class_weight: vec![ClassWeight::Uniform, ClassWeight::Balanced],
        }
    }
}

impl ParamGrid {
    /// A grid holding exactly one candidate.
    #[must_use]
    pub fn single(params: ForestParams) -> Self {
        Self {
            n_estimators: vec![params.n_estimators],
            max_depth: vec![params.max_depth],
            min_samples_split: vec![params.min_samples_split],
            min_samples_leaf: vec![params.min_samples_leaf],
            class_weight: vec![params.class_weight],
        }
    }

    /// Number of candidates in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
            * self.class_weight.len()
    }

    /// Returns `true` if any parameter list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All candidates in grid order.
    #[must_use]
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &class_weight in &self.class_weight {
            for &max_depth in &self.max_depth {
                for &min_samples_leaf in &self.min_samples_leaf {
                    for &min_samples_split in &self.min_samples_split {
                        for &n_estimators in &self.n_estimators {
                            out.push(ForestParams {
                                n_estimators,
                                max_depth,
                                min_samples_split,
                                min_samples_leaf,
                                class_weight,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    fn validate(&self) -> Result<(), LearningError> {
        if self.is_empty() {
            return Err(LearningError::InvalidConfig(
                "param_grid must contain at least one value per parameter".to_string(),
            ));
        }
        if self.n_estimators.contains(&0) {
            return Err(LearningError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth.contains(&Some(0)) {
            return Err(LearningError::InvalidConfig(
                "max_depth must be at least 1 or unbounded".to_string(),
            ));
        }
        if self.min_samples_split.iter().any(|&n| n < 2) {
            return Err(LearningError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf.contains(&0) {
            return Err(LearningError::InvalidConfig(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for training the status classifier.
///
/// Use [`TrainingConfig::builder()`] to construct a configuration with the
/// builder pattern. The defaults reproduce the production model: the seven
/// catalog features, `status` as target, a 20% test split with seed 42 and
/// 3-fold cross-validation over the default [`ParamGrid`].
///
/// # Validation
///
/// The builder validates the following constraints on [`build()`](TrainingConfigBuilder::build):
/// - `features` must be non-empty and must not contain the target
/// - `test_size` must be in range `(0.0, 1.0)` (exclusive)
/// - `cv_folds` must be at least 2
/// - `n_jobs` must be `-1` or positive
/// - every grid list must be non-empty with valid values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Feature columns, in model input order.
    pub features: Vec<String>,

    /// Target column (default: `status`).
    pub target: String,

    /// Fraction of rows held out for the test split (default: 0.2).
    pub test_size: f64,

    /// Seed for the split shuffle, bootstrap samples and feature sampling
    /// (default: 42).
    pub random_seed: u64,

    /// Number of stratified cross-validation folds (default: 3).
    pub cv_folds: usize,

    /// Number of parallel grid-search workers (default: -1 for all cores).
    ///
    /// - `-1`: Use all available CPU cores
    /// - `1`: Single-threaded (useful for debugging)
    /// - `n > 1`: Use exactly `n` workers
    pub n_jobs: i32,

    /// Hyperparameter grid.
    pub param_grid: ParamGrid,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            features: MODEL_FEATURES.iter().map(|f| (*f).to_string()).collect(),
            target: "status".to_string(),
            test_size: 0.2,
            random_seed: 42,
            cv_folds: 3,
            n_jobs: -1,
            param_grid: ParamGrid::default(),
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Worker count after resolving `-1` to the available parallelism.
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.n_jobs > 0 {
            self.n_jobs as usize
        } else {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        }
    }

    /// Check every constraint listed on the type.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.features.is_empty() {
            return Err(LearningError::InvalidConfig(
                "at least one feature is required".to_string(),
            ));
        }
        if self.features.contains(&self.target) {
            return Err(LearningError::InvalidConfig(format!(
                "target '{}' cannot also be a feature",
                self.target
            )));
        }
        if self.test_size <= 0.0 || self.test_size >= 1.0 {
            return Err(LearningError::InvalidConfig(
                "test_size must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }
        if self.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }
        if self.n_jobs == 0 || self.n_jobs < -1 {
            return Err(LearningError::InvalidConfig(
                "n_jobs must be -1 or a positive number".to_string(),
            ));
        }
        self.param_grid.validate()
    }
}

/// Builder for [`TrainingConfig`].
///
/// Created via [`TrainingConfig::builder()`]. All setters return `self` to
/// allow method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Replace the feature list.
    #[must_use]
    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Set the target column (default: `status`).
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = target.into();
        self
    }

    /// Set the test size fraction (default: 0.2).
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    /// Set the random seed (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the number of cross-validation folds (default: 3).
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Set the number of parallel jobs (default: -1 for all cores).
    #[must_use]
    pub fn n_jobs(mut self, jobs: i32) -> Self {
        self.config.n_jobs = jobs;
        self
    }

    /// Replace the hyperparameter grid.
    #[must_use]
    pub fn param_grid(mut self, grid: ParamGrid) -> Self {
        self.config.param_grid = grid;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if any constraint listed on
    /// [`TrainingConfig`] is violated.
    pub fn build(self) -> Result<TrainingConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // ParamGrid
    // ========================================================================

    #[test]
    fn test_default_grid_size() {
        let grid = ParamGrid::default();
        assert_eq!(grid.len(), 48);
        assert_eq!(grid.candidates().len(), 48);
    }

    #[test]
    fn test_candidate_order() {
        let candidates = ParamGrid::default().candidates();

        // n_estimators varies fastest
        assert_eq!(candidates[0].n_estimators, 100);
        assert_eq!(candidates[1].n_estimators, 200);
        assert_eq!(candidates[0].min_samples_split, 2);
        assert_eq!(candidates[2].min_samples_split, 5);
        assert_eq!(candidates[4].min_samples_leaf, 2);
        assert_eq!(candidates[8].max_depth, Some(10));

        // class_weight varies slowest
        assert!(candidates[..24].iter().all(|c| c.class_weight == ClassWeight::Uniform));
        assert!(candidates[24..].iter().all(|c| c.class_weight == ClassWeight::Balanced));
    }

    #[test]
    fn test_single_grid() {
        let params = ForestParams::default();
        let grid = ParamGrid::single(params.clone());
        assert_eq!(grid.candidates(), vec![params]);
    }

    // ========================================================================
    // TrainingConfig
    // ========================================================================

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.features.len(), 7);
        assert_eq!(config.features[6], "object_type");
        assert_eq!(config.target, "status");
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.cv_folds, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::builder()
            .features(["span", "perigee_km"])
            .cv_folds(4)
            .n_jobs(2)
            .build()
            .unwrap();
        assert_eq!(config.features, vec!["span", "perigee_km"]);
        assert_eq!(config.cv_folds, 4);
        assert_eq!(config.effective_jobs(), 2);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(TrainingConfig::builder().test_size(0.0).build().is_err());
        assert!(TrainingConfig::builder().test_size(1.0).build().is_err());
        assert!(TrainingConfig::builder().cv_folds(1).build().is_err());
        assert!(TrainingConfig::builder().n_jobs(0).build().is_err());
        assert!(TrainingConfig::builder().n_jobs(-2).build().is_err());
        assert!(
            TrainingConfig::builder()
                .features(Vec::<String>::new())
                .build()
                .is_err()
        );
        assert!(
            TrainingConfig::builder()
                .features(["span", "status"])
                .build()
                .is_err()
        );

        let mut grid = ParamGrid::default();
        grid.min_samples_split = vec![1];
        assert!(TrainingConfig::builder().param_grid(grid).build().is_err());
    }

    #[test]
    fn test_all_cores() {
        let config = TrainingConfig::default();
        assert!(config.effective_jobs() >= 1);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"cv_folds": 5, "param_grid": {"n_estimators": [10]}}"#)
                .unwrap();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.param_grid.n_estimators, vec![10]);
        assert_eq!(config.param_grid.max_depth.len(), 3);
        assert_eq!(config.target, "status");
    }
}
