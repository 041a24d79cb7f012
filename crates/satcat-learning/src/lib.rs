//! satcat-learning: status classifier for the reconciled satellite catalog.
//!
//! Trains a random forest that predicts an object's status label from seven
//! physical and orbital features, and serves predictions from the persisted
//! model artifacts.
//!
//! # Features
//!
//! - **Preprocessing**: mode imputation, label encoding, status mapping,
//!   seeded train/test split and standard scaling
//! - **Random Forest**: Gini CART trees on bootstrap samples with optional
//!   balanced class weights
//! - **Grid Search**: stratified k-fold cross-validation scored by macro-F1,
//!   parallelized over candidates
//! - **Serving**: a thread-safe [`Predictor`] that extends categorical
//!   encoders with values first seen at request time
//! - **Progress Reporting**: stage-by-stage training callbacks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use satcat_learning::{Predictor, Trainer, TrainingConfig};
//! use satcat_processing::ArtifactStore;
//!
//! let store = ArtifactStore::new("artifacts");
//!
//! // Train on combined_df.csv and write the model artifacts next to it
//! let output = Trainer::builder()
//!     .config(TrainingConfig::default())
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build()?
//!     .train_from_store(&store)?;
//! println!("Best: {} (CV macro-F1 {:.3})", output.result.best_params, output.result.cv_score);
//!
//! // Serve
//! let predictor = Predictor::load(&store)?;
//! let status = predictor.predict_request(&request)?;
//! ```
//!
//! # Artifacts
//!
//! | Name                      | Content                                  |
//! |---------------------------|------------------------------------------|
//! | `ran_for_model`           | the fitted [`RandomForest`]              |
//! | `scaler`                  | the [`StandardScaler`] fit on the train split |
//! | `status_mapping`          | the [`StatusMapping`] in first-seen order |
//! | `<feature>_label_encoder` | one [`LabelEncoder`] per categorical feature |
//! | `training_report`         | the [`TrainingResult`]                   |
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]. See
//! [`LearningError`] for the complete list of variants.

mod config;
mod error;
pub mod forest;
pub mod metrics;
mod model;
mod pipeline;
pub mod preprocess;
mod progress;
pub mod search;
mod types;

// Configuration
pub use config::{ParamGrid, TrainingConfig, TrainingConfigBuilder};

// Error handling
pub use error::LearningError;

// Model
pub use forest::{ClassWeight, ForestParams, RandomForest};
pub use model::Predictor;
pub use preprocess::{LabelEncoder, StandardScaler, StatusMapping};

// Training
pub use pipeline::{
    MODEL_ARTIFACT, ModelArtifacts, SCALER_ARTIFACT, STATUS_MAPPING_ARTIFACT,
    TRAINING_REPORT_ARTIFACT, Trainer, TrainerBuilder, TrainingOutput, encoder_artifact,
};

// Progress reporting
pub use progress::{ParseTrainingStageError, ProgressCallback, ProgressUpdate, TrainingStage};

// Result types
pub use types::{
    CandidateScore, ClassReport, FeatureRecord, FeatureValue, Metrics, Prediction,
    PredictionRequest, TrainingResult,
};
