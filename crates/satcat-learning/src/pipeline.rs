//! Training pipeline implementation.
//!
//! This module provides the [`Trainer`] and its builder. Training runs these
//! stages in order:
//!
//! 1. **Preprocessing** - Impute, label-encode, split 80/20 and scale
//! 2. **Searching** - Cross-validate every grid candidate by macro-F1
//! 3. **Training** - Refit the best candidate on the whole training split
//! 4. **Evaluating** - Score the test split
//! 5. **Persisting** - Write the model artifacts (only when training from a store)
//!
//! # Example
//!
//! ```rust,ignore
//! use satcat_learning::{Trainer, TrainingConfig};
//! use satcat_processing::ArtifactStore;
//!
//! let trainer = Trainer::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|update| println!("{:.0}% - {}", update.progress * 100.0, update.message))
//!     .build()?;
//!
//! let store = ArtifactStore::new("artifacts");
//! let output = trainer.train_from_store(&store)?;
//! println!("Test macro-F1: {:.3}", output.result.metrics.macro_f1);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use polars::prelude::DataFrame;
use satcat_processing::table::io::to_dataframe;
use satcat_processing::{ArtifactStore, COMBINED_DATASET};
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::error::LearningError;
use crate::forest::RandomForest;
use crate::metrics::{accuracy, confusion_matrix, macro_f1, per_class_report};
use crate::preprocess::{
    LabelEncoder, RawDataset, StandardScaler, StatusMapping, prepare, take, train_test_split,
};
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::search::{SearchData, best_candidate, grid_search, sparse_classes, stratified_folds};
use crate::types::{Metrics, TrainingResult};

/// Artifact holding the fitted forest.
pub const MODEL_ARTIFACT: &str = "ran_for_model";
pub const SCALER_ARTIFACT: &str = "scaler";
pub const STATUS_MAPPING_ARTIFACT: &str = "status_mapping";
pub const TRAINING_REPORT_ARTIFACT: &str = "training_report";

/// Artifact name of the encoder for a categorical feature.
#[must_use]
pub fn encoder_artifact(feature: &str) -> String {
    format!("{feature}_label_encoder")
}

/// Everything needed to serve predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub forest: RandomForest,
    pub scaler: StandardScaler,
    pub mapping: StatusMapping,
    /// Encoders of categorical features, keyed by feature name.
    pub encoders: BTreeMap<String, LabelEncoder>,
}

impl ModelArtifacts {
    /// Write every artifact and the training report into `store`.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::Artifact`] if a file cannot be written.
    pub fn save(
        &self,
        store: &ArtifactStore,
        report: &TrainingResult,
    ) -> Result<Vec<PathBuf>, LearningError> {
        let mut written = vec![
            store.write_json(MODEL_ARTIFACT, &self.forest)?,
            store.write_json(SCALER_ARTIFACT, &self.scaler)?,
            store.write_json(STATUS_MAPPING_ARTIFACT, &self.mapping)?,
        ];
        for (feature, encoder) in &self.encoders {
            written.push(store.write_json(&encoder_artifact(feature), encoder)?);
        }
        written.push(store.write_json(TRAINING_REPORT_ARTIFACT, report)?);
        info!("Wrote {} model artifacts to {}", written.len(), store.root().display());
        Ok(written)
    }

    /// Read the artifacts back from `store`.
    ///
    /// A feature is categorical when its encoder artifact exists.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::Artifact`] if the model, scaler or mapping
    /// is missing or unreadable.
    pub fn load(store: &ArtifactStore) -> Result<Self, LearningError> {
        let forest: RandomForest = store.read_json(MODEL_ARTIFACT)?;
        let scaler: StandardScaler = store.read_json(SCALER_ARTIFACT)?;
        let mapping: StatusMapping = store.read_json(STATUS_MAPPING_ARTIFACT)?;

        let mut encoders = BTreeMap::new();
        for feature in forest.feature_names() {
            let name = encoder_artifact(feature);
            if store.has_json(&name) {
                encoders.insert(feature.clone(), store.read_json::<LabelEncoder>(&name)?);
            }
        }

        if scaler.mean().len() != forest.feature_names().len() {
            return Err(LearningError::ModelNotFitted(format!(
                "scaler for {} features",
                forest.feature_names().len()
            )));
        }
        if mapping.len() != forest.n_classes() {
            return Err(LearningError::ModelNotFitted(format!(
                "status mapping for {} classes",
                forest.n_classes()
            )));
        }

        Ok(Self {
            forest,
            scaler,
            mapping,
            encoders,
        })
    }
}

/// A trained model together with its report.
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    pub result: TrainingResult,
    pub artifacts: ModelArtifacts,
}

/// Trains the status classifier.
///
/// Use [`Trainer::builder()`] to construct a trainer.
pub struct Trainer {
    config: TrainingConfig,
    progress_callback: Option<ProgressCallback>,
}

// Training may be moved onto a worker thread by callers.
static_assertions::assert_impl_all!(Trainer: Send, Sync);

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Trainer {
    /// Create a new builder for `Trainer`.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train on a combined-dataset [`DataFrame`].
    ///
    /// # Errors
    ///
    /// Returns [`LearningError`] if:
    /// - [`MissingFeature`](LearningError::MissingFeature): a feature or the target is absent
    /// - [`InvalidData`](LearningError::InvalidData): too few rows, or a column without values
    /// - [`UnmappedTarget`](LearningError::UnmappedTarget): a target is not a status label
    pub fn train(&self, df: &DataFrame) -> Result<TrainingOutput, LearningError> {
        let outcome = self.train_internal(df);
        self.finish(outcome)
    }

    /// Train on the store's combined dataset and persist the artifacts there.
    ///
    /// # Errors
    ///
    /// As [`train`](Self::train), plus [`LearningError::Artifact`] if the
    /// dataset cannot be read or the artifacts cannot be written.
    pub fn train_from_store(&self, store: &ArtifactStore) -> Result<TrainingOutput, LearningError> {
        let outcome = self.train_from_store_internal(store);
        self.finish(outcome)
    }

    fn train_from_store_internal(
        &self,
        store: &ArtifactStore,
    ) -> Result<TrainingOutput, LearningError> {
        self.report(TrainingStage::Preprocessing, 0.0, "Reading combined dataset");
        let table = store.read_table(COMBINED_DATASET)?;
        let df = to_dataframe(&table)?;

        let output = self.train_internal(&df)?;

        self.report(TrainingStage::Persisting, 0.95, "Writing model artifacts");
        output.artifacts.save(store, &output.result)?;
        Ok(output)
    }

    fn finish(
        &self,
        outcome: Result<TrainingOutput, LearningError>,
    ) -> Result<TrainingOutput, LearningError> {
        match &outcome {
            Ok(output) => self.report(
                TrainingStage::Complete,
                1.0,
                format!(
                    "Training finished: test macro-F1 {:.4}",
                    output.result.metrics.macro_f1
                ),
            ),
            Err(e) => self.report(TrainingStage::Failed, 1.0, e.to_string()),
        }
        outcome
    }

    fn report(&self, stage: TrainingStage, progress: f64, message: impl Into<String>) {
        if let Some(callback) = &self.progress_callback {
            callback(ProgressUpdate::new(stage, progress, message));
        }
    }

    fn train_internal(&self, df: &DataFrame) -> Result<TrainingOutput, LearningError> {
        let start = Instant::now();
        let config = &self.config;
        let mut warnings = Vec::new();

        // Preprocessing
        self.report(TrainingStage::Preprocessing, 0.02, "Imputing and encoding features");
        let raw = RawDataset::from_dataframe(df, &config.features, &config.target)?;
        let prepared = prepare(&raw)?;
        let n_classes = prepared.mapping.len();
        let class_names: Vec<String> = prepared
            .mapping
            .labels()
            .iter()
            .map(|l| l.code().to_string())
            .collect();
        info!(
            "Prepared {} rows, {} features, {} classes",
            raw.len(),
            prepared.feature_names.len(),
            n_classes
        );

        let (train_idx, test_idx) =
            train_test_split(raw.len(), config.test_size, config.random_seed)?;
        let mut x_train = take(&prepared.x, &train_idx);
        let mut x_test = take(&prepared.x, &test_idx);
        let y_train = take(&prepared.y, &train_idx);
        let y_test = take(&prepared.y, &test_idx);

        let scaler = StandardScaler::fit(&x_train)?;
        scaler.transform_all(&mut x_train)?;
        scaler.transform_all(&mut x_test)?;
        self.report(
            TrainingStage::Preprocessing,
            0.1,
            format!("Split {} train / {} test rows", x_train.len(), x_test.len()),
        );

        for class in sparse_classes(&y_train, config.cv_folds) {
            let message = format!(
                "Class '{}' has fewer training rows than the {} CV folds",
                class_names[class], config.cv_folds
            );
            warn!("{}", message);
            warnings.push(message);
        }

        // Searching
        let folds = stratified_folds(&y_train, config.cv_folds)?;
        let candidates = config.param_grid.candidates();
        let data = SearchData {
            x: &x_train,
            y: &y_train,
            n_classes,
            feature_names: &prepared.feature_names,
            seed: config.random_seed,
        };
        let callback = self.progress_callback.clone();
        let scores = grid_search(
            &data,
            &folds,
            &candidates,
            config.effective_jobs(),
            |done, total| {
                if let Some(callback) = &callback {
                    let mut update = ProgressUpdate::new(
                        TrainingStage::Searching,
                        0.1 + 0.7 * done as f64 / total as f64,
                        format!("Cross-validated candidate {done}/{total}"),
                    );
                    update.candidates_completed = Some((done, total));
                    callback(update);
                }
            },
        )?;
        let best = best_candidate(&scores)
            .ok_or_else(|| LearningError::InvalidConfig("parameter grid is empty".to_string()))?;
        let best_params = scores[best].params.clone();
        let cv_score = scores[best].mean_score;
        info!("Best candidate: {} (CV macro-F1 {:.4})", best_params, cv_score);

        // Training
        self.report(TrainingStage::Training, 0.8, format!("Refitting {best_params}"));
        let forest = RandomForest::fit(
            &x_train,
            &y_train,
            n_classes,
            &prepared.feature_names,
            &best_params,
            config.random_seed,
        )?;

        // Evaluating
        self.report(TrainingStage::Evaluating, 0.9, "Scoring the test split");
        let predicted = forest.predict_many(&x_test)?;
        let metrics = Metrics {
            accuracy: accuracy(&y_test, &predicted),
            macro_f1: macro_f1(&y_test, &predicted),
            confusion_matrix: confusion_matrix(&y_test, &predicted, n_classes),
            per_class: per_class_report(&y_test, &predicted, &class_names),
        };
        info!(
            "Test accuracy {:.4}, macro-F1 {:.4}",
            metrics.accuracy, metrics.macro_f1
        );

        let mut feature_importance: Vec<(String, f64)> = prepared
            .feature_names
            .iter()
            .cloned()
            .zip(forest.feature_importances().iter().copied())
            .collect();
        feature_importance.sort_by(|a, b| b.1.total_cmp(&a.1));

        let result = TrainingResult {
            best_params,
            cv_score,
            candidates: scores,
            metrics,
            feature_importance,
            train_rows: x_train.len(),
            test_rows: x_test.len(),
            classes: prepared.mapping.labels().to_vec(),
            training_time_seconds: start.elapsed().as_secs_f64(),
            warnings,
        };

        Ok(TrainingOutput {
            result,
            artifacts: ModelArtifacts {
                forest,
                scaler,
                mapping: prepared.mapping,
                encoders: prepared.encoders,
            },
        })
    }
}

/// Builder for [`Trainer`].
#[derive(Default)]
pub struct TrainerBuilder {
    config: Option<TrainingConfig>,
    progress_callback: Option<ProgressCallback>,
}

impl TrainerBuilder {
    /// Set the training configuration (default: [`TrainingConfig::default()`]).
    #[must_use]
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress callback.
    ///
    /// Grid-search workers call it from their own threads.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Build the trainer.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if the configuration is invalid.
    pub fn build(self) -> Result<Trainer, LearningError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(Trainer {
            config,
            progress_callback: self.progress_callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamGrid;
    use crate::forest::ForestParams;
    use parking_lot::Mutex;
    use polars::prelude::*;

    /// Reentered objects sit low, in-orbit objects sit high.
    fn frame(rows: usize) -> DataFrame {
        let perigee: Vec<f64> = (0..rows)
            .map(|i| if i % 2 == 0 { 150.0 + i as f64 } else { 700.0 + i as f64 })
            .collect();
        let object_type: Vec<&str> = (0..rows)
            .map(|i| if i % 3 == 0 { "R/B" } else { "PAY" })
            .collect();
        let status: Vec<&str> = (0..rows).map(|i| if i % 2 == 0 { "R" } else { "O" }).collect();
        df!(
            "perigee_km" => perigee,
            "object_type" => object_type,
            "status" => status
        )
        .unwrap()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig::builder()
            .features(["perigee_km", "object_type"])
            .param_grid(ParamGrid::single(ForestParams {
                n_estimators: 5,
                ..ForestParams::default()
            }))
            .n_jobs(1)
            .build()
            .unwrap()
    }

    // ========================================================================
    // Training
    // ========================================================================

    #[test]
    fn test_train_learns_perigee() {
        let trainer = Trainer::builder().config(small_config()).build().unwrap();
        let output = trainer.train(&frame(40)).unwrap();

        assert_eq!(output.result.train_rows, 32);
        assert_eq!(output.result.test_rows, 8);
        assert_eq!(output.result.candidates.len(), 1);
        assert_eq!(output.result.metrics.accuracy, 1.0);
        assert_eq!(output.result.feature_importance[0].0, "perigee_km");
        assert!(output.artifacts.encoders.contains_key("object_type"));
        assert!(!output.artifacts.encoders.contains_key("perigee_km"));
    }

    #[test]
    fn test_train_reports_stages() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let trainer = Trainer::builder()
            .config(small_config())
            .on_progress(move |update| sink.lock().push(update.stage))
            .build()
            .unwrap();
        trainer.train(&frame(30)).unwrap();

        let stages = stages.lock();
        assert_eq!(stages.first(), Some(&TrainingStage::Preprocessing));
        assert!(stages.contains(&TrainingStage::Searching));
        assert!(stages.contains(&TrainingStage::Evaluating));
        assert_eq!(stages.last(), Some(&TrainingStage::Complete));
    }

    #[test]
    fn test_train_missing_feature_fails() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let config = TrainingConfig::builder()
            .features(["total_mass"])
            .build()
            .unwrap();
        let trainer = Trainer::builder()
            .config(config)
            .on_progress(move |update| sink.lock().push(update.stage))
            .build()
            .unwrap();

        let err = trainer.train(&frame(30)).unwrap_err();
        assert!(matches!(err, LearningError::MissingFeature(name) if name == "total_mass"));
        assert_eq!(stages.lock().last(), Some(&TrainingStage::Failed));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = TrainingConfig::default();
        config.cv_folds = 1;
        assert!(Trainer::builder().config(config).build().is_err());
    }

    // ========================================================================
    // Artifacts
    // ========================================================================

    #[test]
    fn test_artifacts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let trainer = Trainer::builder().config(small_config()).build().unwrap();
        let output = trainer.train(&frame(30)).unwrap();

        output.artifacts.save(&store, &output.result).unwrap();
        assert!(store.has_json("ran_for_model"));
        assert!(store.has_json("scaler"));
        assert!(store.has_json("status_mapping"));
        assert!(store.has_json("object_type_label_encoder"));
        assert!(!store.has_json("perigee_km_label_encoder"));
        assert!(store.has_json("training_report"));

        let loaded = ModelArtifacts::load(&store).unwrap();
        assert_eq!(loaded.mapping, output.artifacts.mapping);
        assert_eq!(loaded.encoders, output.artifacts.encoders);
        assert_eq!(loaded.forest.trees().len(), 5);

        let rows = vec![vec![-1.0, 0.0], vec![1.0, 1.0], vec![0.2, 0.0]];
        assert_eq!(
            loaded.forest.predict_many(&rows).unwrap(),
            output.artifacts.forest.predict_many(&rows).unwrap()
        );
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifacts::load(&ArtifactStore::new(dir.path())).unwrap_err();
        assert_eq!(err.error_code(), "ARTIFACT_NOT_FOUND");
    }
}
