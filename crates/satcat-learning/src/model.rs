//! Serving-side model.
//!
//! A [`Predictor`] deserializes the model artifacts once and then answers
//! predictions concurrently. Categorical encoders sit behind
//! [`parking_lot::RwLock`]s: lookups share the read lock, and a value never
//! seen in training takes the write lock to append itself as a new class.
//!
//! # Example
//!
//! ```rust,ignore
//! use satcat_learning::{PredictionRequest, Predictor};
//! use satcat_processing::ArtifactStore;
//!
//! let predictor = Predictor::load(&ArtifactStore::new("artifacts"))?;
//! let request: PredictionRequest = serde_json::from_str(body)?;
//! println!("{}", predictor.predict_request(&request)?);
//! ```

use std::collections::BTreeMap;

use parking_lot::RwLock;
use satcat_processing::table::format_number;
use satcat_processing::{ArtifactStore, StatusLabel, parse_numeric_string};
use tracing::info;

use crate::error::LearningError;
use crate::forest::RandomForest;
use crate::pipeline::ModelArtifacts;
use crate::preprocess::{LabelEncoder, StandardScaler, StatusMapping};
use crate::types::{FeatureRecord, FeatureValue, PredictionRequest};

/// A loaded model ready to serve predictions.
#[derive(Debug)]
pub struct Predictor {
    forest: RandomForest,
    scaler: StandardScaler,
    mapping: StatusMapping,
    encoders: BTreeMap<String, RwLock<LabelEncoder>>,
}

// Shared across request handlers.
static_assertions::assert_impl_all!(Predictor: Send, Sync);

impl Predictor {
    #[must_use]
    pub fn new(artifacts: ModelArtifacts) -> Self {
        Self {
            forest: artifacts.forest,
            scaler: artifacts.scaler,
            mapping: artifacts.mapping,
            encoders: artifacts
                .encoders
                .into_iter()
                .map(|(name, encoder)| (name, RwLock::new(encoder)))
                .collect(),
        }
    }

    /// Load the model artifacts from `store`.
    ///
    /// # Errors
    ///
    /// See [`ModelArtifacts::load`].
    pub fn load(store: &ArtifactStore) -> Result<Self, LearningError> {
        let predictor = Self::new(ModelArtifacts::load(store)?);
        info!(
            "Loaded model with {} trees over {} features",
            predictor.forest.trees().len(),
            predictor.forest.feature_names().len()
        );
        Ok(predictor)
    }

    /// Feature names in model input order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        self.forest.feature_names()
    }

    /// Status labels the model can predict.
    #[must_use]
    pub fn classes(&self) -> &[StatusLabel] {
        self.mapping.labels()
    }

    /// Current classes of a categorical feature's encoder.
    #[must_use]
    pub fn encoder_classes(&self, feature: &str) -> Option<Vec<String>> {
        self.encoders
            .get(feature)
            .map(|encoder| encoder.read().classes().to_vec())
    }

    /// Predict the status of one object.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::MissingFeature`] if a model feature is
    /// absent from `record`, or [`LearningError::InvalidData`] if a
    /// numeric feature holds non-numeric text.
    pub fn predict(&self, record: &FeatureRecord) -> Result<StatusLabel, LearningError> {
        let mut row = Vec::with_capacity(self.feature_names().len());
        for name in self.feature_names() {
            let value = record
                .get(name)
                .ok_or_else(|| LearningError::MissingFeature(name.clone()))?;
            let encoded = match self.encoders.get(name) {
                Some(encoder) => encode_category(name, encoder, value) as f64,
                None => numeric_value(name, value)?,
            };
            row.push(encoded);
        }

        self.scaler.transform(&mut row)?;
        let class = self.forest.predict(&row)?;
        self.mapping.decode(class)
    }

    /// Predict from the typed API request.
    ///
    /// # Errors
    ///
    /// See [`predict`](Self::predict).
    pub fn predict_request(&self, request: &PredictionRequest) -> Result<StatusLabel, LearningError> {
        self.predict(&request.to_record())
    }
}

fn encode_category(name: &str, encoder: &RwLock<LabelEncoder>, value: &FeatureValue) -> usize {
    let text = match value {
        FeatureValue::Text(text) => text.clone(),
        FeatureValue::Number(n) => format_number(*n),
    };
    if let Some(code) = encoder.read().transform(&text) {
        return code;
    }
    let code = encoder.write().encode_or_extend(&text);
    info!("Added unseen value '{}' to the '{}' encoder as class {}", text, name, code);
    code
}

fn numeric_value(name: &str, value: &FeatureValue) -> Result<f64, LearningError> {
    match value {
        FeatureValue::Number(n) => Ok(*n),
        FeatureValue::Text(text) => parse_numeric_string(text).ok_or_else(|| {
            LearningError::InvalidData(format!("feature '{name}' expects a number, got '{text}'"))
        }),
    }
}
