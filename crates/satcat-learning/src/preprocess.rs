//! Feature extraction, imputation, encoding, splitting and scaling.
//!
//! The combined dataset arrives as a polars [`DataFrame`]. String columns
//! are treated as categorical and every other dtype is cast to `f64`.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, DataType};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use satcat_processing::{StatusLabel, most_frequent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LearningError;

/// Raw values of one feature column.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl FeatureColumn {
    fn missing_count(&self) -> usize {
        match self {
            FeatureColumn::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            FeatureColumn::Categorical(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }
}

/// Feature and target columns pulled out of the combined dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    pub features: Vec<(String, FeatureColumn)>,
    pub target: Vec<Option<String>>,
}

impl RawDataset {
    /// Extract `features` and `target` from `df`.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::MissingFeature`] for an absent feature or
    /// target column, or a polars error if a cast fails.
    pub fn from_dataframe(
        df: &DataFrame,
        features: &[String],
        target: &str,
    ) -> Result<Self, LearningError> {
        let mut columns = Vec::with_capacity(features.len());
        for name in features {
            let series = df
                .column(name)
                .map_err(|_| LearningError::MissingFeature(name.clone()))?
                .as_materialized_series();

            let column = if series.dtype() == &DataType::String {
                let values = series
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect();
                FeatureColumn::Categorical(values)
            } else {
                let cast = series.cast(&DataType::Float64)?;
                FeatureColumn::Numeric(cast.f64()?.into_iter().collect())
            };
            columns.push((name.clone(), column));
        }

        let target_series = df
            .column(target)
            .map_err(|_| LearningError::MissingFeature(target.to_string()))?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let target_values = target_series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();

        Ok(Self {
            features: columns,
            target: target_values,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.target.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

// =============================================================================
// Imputation
// =============================================================================

/// Most frequent number; ties go to the smallest.
#[must_use]
pub fn numeric_mode(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut j = i;
        while j < sorted.len() && sorted[j] == value {
            j += 1;
        }
        let count = j - i;
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((value, count));
        }
        i = j;
    }
    best.map(|(value, _)| value)
}

fn impute_numeric(name: &str, values: &[Option<f64>]) -> Result<Vec<f64>, LearningError> {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    let fill = numeric_mode(&present).ok_or_else(|| {
        LearningError::InvalidData(format!("feature '{name}' has no values to impute from"))
    })?;
    Ok(values
        .iter()
        .map(|v| v.filter(|n| !n.is_nan()).unwrap_or(fill))
        .collect())
}

fn impute_text(name: &str, values: &[Option<String>]) -> Result<Vec<String>, LearningError> {
    let fill = most_frequent(values.iter().flatten()).ok_or_else(|| {
        LearningError::InvalidData(format!("column '{name}' has no values to impute from"))
    })?;
    Ok(values
        .iter()
        .map(|v| v.clone().unwrap_or_else(|| fill.clone()))
        .collect())
}

// =============================================================================
// Encoders
// =============================================================================

/// Maps category strings to integer codes.
///
/// Classes are sorted when fitted; values first seen while serving are
/// appended, so codes of existing classes never change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the distinct values of `values`.
    #[must_use]
    pub fn fit<S: AsRef<str>>(values: &[S]) -> Self {
        let mut classes: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Code of `value`, if known.
    #[must_use]
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == value)
    }

    /// Code of `value`, appending it as a new class when unseen.
    pub fn encode_or_extend(&mut self, value: &str) -> usize {
        match self.transform(value) {
            Some(code) => code,
            None => {
                debug!("Extending encoder with unseen class '{}'", value);
                self.classes.push(value.to_string());
                self.classes.len() - 1
            }
        }
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Maps status labels to class indices in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusMapping {
    labels: Vec<StatusLabel>,
}

impl StatusMapping {
    /// Build from target values.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::UnmappedTarget`] for a value that is not a
    /// status label code.
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Result<Self, LearningError> {
        let mut labels = Vec::new();
        for value in values {
            let label = parse_label(value.as_ref())?;
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        Ok(Self { labels })
    }

    /// Class index of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::UnmappedTarget`] if `value` is not in the mapping.
    pub fn encode(&self, value: &str) -> Result<usize, LearningError> {
        let label = parse_label(value)?;
        self.labels
            .iter()
            .position(|l| *l == label)
            .ok_or_else(|| LearningError::UnmappedTarget(value.to_string()))
    }

    /// Label for a class index.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::UnmappedTarget`] for an index past the end.
    pub fn decode(&self, index: usize) -> Result<StatusLabel, LearningError> {
        self.labels
            .get(index)
            .copied()
            .ok_or_else(|| LearningError::UnmappedTarget(format!("class index {index}")))
    }

    #[must_use]
    pub fn labels(&self) -> &[StatusLabel] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn parse_label(value: &str) -> Result<StatusLabel, LearningError> {
    value
        .parse::<StatusLabel>()
        .map_err(|_| LearningError::UnmappedTarget(value.to_string()))
}

/// Standardizes features to zero mean and unit variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `rows` using the population standard deviation.
    ///
    /// Features with zero variance get a scale of one.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] if `rows` is empty or ragged.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, LearningError> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| LearningError::InvalidData("cannot fit a scaler on zero rows".into()))?;
        if rows.iter().any(|r| r.len() != width) {
            return Err(LearningError::InvalidData("rows have different widths".into()));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }
        let scale = variance
            .iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std == 0.0 { 1.0 } else { std }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    /// Scale one row in place.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::ModelNotFitted`] if the row width differs
    /// from the fitted width.
    pub fn transform(&self, row: &mut [f64]) -> Result<(), LearningError> {
        if row.len() != self.mean.len() {
            return Err(LearningError::ModelNotFitted(format!(
                "scaler for {} features",
                row.len()
            )));
        }
        for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
            *v = (*v - m) / s;
        }
        Ok(())
    }

    /// Scale every row in place.
    ///
    /// # Errors
    ///
    /// See [`transform`](Self::transform).
    pub fn transform_all(&self, rows: &mut [Vec<f64>]) -> Result<(), LearningError> {
        rows.iter_mut().try_for_each(|row| self.transform(row))
    }

    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

// =============================================================================
// Dataset preparation
// =============================================================================

/// Imputed and encoded training data, not yet split or scaled.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub feature_names: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<usize>,
    pub encoders: BTreeMap<String, LabelEncoder>,
    pub mapping: StatusMapping,
}

/// Impute every column, label-encode categorical features and map targets.
///
/// # Errors
///
/// Returns [`LearningError::InvalidData`] for an empty dataset or a column
/// without any value, and [`LearningError::UnmappedTarget`] for a target
/// that is not a status label.
pub fn prepare(raw: &RawDataset) -> Result<PreparedData, LearningError> {
    if raw.is_empty() {
        return Err(LearningError::InvalidData("dataset has no rows".to_string()));
    }

    let n = raw.len();
    let mut x = vec![Vec::with_capacity(raw.features.len()); n];
    let mut encoders = BTreeMap::new();

    for (name, column) in &raw.features {
        let missing = column.missing_count();
        if missing > 0 {
            debug!("Imputing {} missing values in '{}'", missing, name);
        }
        match column {
            FeatureColumn::Numeric(values) => {
                for (row, v) in x.iter_mut().zip(impute_numeric(name, values)?) {
                    row.push(v);
                }
            }
            FeatureColumn::Categorical(values) => {
                let filled = impute_text(name, values)?;
                let encoder = LabelEncoder::fit(&filled);
                for (row, v) in x.iter_mut().zip(&filled) {
                    let code = encoder.transform(v).ok_or_else(|| {
                        LearningError::ModelNotFitted(format!("encoder for '{name}'"))
                    })?;
                    row.push(code as f64);
                }
                encoders.insert(name.clone(), encoder);
            }
        }
    }

    let targets = impute_text("target", &raw.target)?;
    let mapping = StatusMapping::from_values(&targets)?;
    let y = targets
        .iter()
        .map(|t| mapping.encode(t))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PreparedData {
        feature_names: raw.features.iter().map(|(name, _)| name.clone()).collect(),
        x,
        y,
        encoders,
        mapping,
    })
}

/// Shuffled train/test index split.
///
/// The test split holds `ceil(n * test_size)` rows.
///
/// # Errors
///
/// Returns [`LearningError::InvalidData`] if either split would be empty.
pub fn train_test_split(
    n: usize,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), LearningError> {
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(LearningError::InvalidData(format!(
            "{n} rows cannot be split with test_size {test_size}"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Select rows of `values` by index.
#[must_use]
pub fn take<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df!(
            "span" => [Some(1.0), None, Some(3.0), Some(3.0)],
            "object_type" => [Some("PAY"), Some("R/B"), None, Some("PAY")],
            "status" => [Some("R"), Some("O"), None, Some("R")]
        )
        .unwrap()
    }

    fn features() -> Vec<String> {
        vec!["span".to_string(), "object_type".to_string()]
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    #[test]
    fn test_extract_kinds() {
        let raw = RawDataset::from_dataframe(&frame(), &features(), "status").unwrap();
        assert_eq!(raw.len(), 4);
        assert!(matches!(raw.features[0].1, FeatureColumn::Numeric(_)));
        assert!(matches!(raw.features[1].1, FeatureColumn::Categorical(_)));
    }

    #[test]
    fn test_extract_missing_feature() {
        let err = RawDataset::from_dataframe(&frame(), &["mass".to_string()], "status").unwrap_err();
        assert!(matches!(err, LearningError::MissingFeature(name) if name == "mass"));
    }

    // ========================================================================
    // Imputation
    // ========================================================================

    #[test]
    fn test_numeric_mode_ties_smallest() {
        assert_eq!(numeric_mode(&[3.0, 1.0, 3.0, 1.0, 2.0]), Some(1.0));
        assert_eq!(numeric_mode(&[5.0, 5.0, 1.0]), Some(5.0));
        assert_eq!(numeric_mode(&[]), None);
    }

    #[test]
    fn test_prepare_imputes_and_encodes() {
        let raw = RawDataset::from_dataframe(&frame(), &features(), "status").unwrap();
        let prepared = prepare(&raw).unwrap();

        // span mode 3.0 fills row 1; object_type mode PAY fills row 2
        assert_eq!(prepared.x[1][0], 3.0);
        let encoder = &prepared.encoders["object_type"];
        assert_eq!(encoder.classes(), ["PAY", "R/B"]);
        assert_eq!(prepared.x[2][1], 0.0);
        assert_eq!(prepared.x[1][1], 1.0);

        // status mode R fills row 2; R appears first
        assert_eq!(prepared.mapping.labels(), [StatusLabel::Reentered, StatusLabel::InOrbit]);
        assert_eq!(prepared.y, vec![0, 1, 0, 0]);
    }

    #[test]
    fn test_prepare_rejects_all_missing() {
        let raw = RawDataset {
            features: vec![("span".to_string(), FeatureColumn::Numeric(vec![None, None]))],
            target: vec![Some("R".to_string()), Some("O".to_string())],
        };
        assert!(matches!(prepare(&raw), Err(LearningError::InvalidData(_))));
    }

    // ========================================================================
    // Encoders
    // ========================================================================

    #[test]
    fn test_label_encoder_extend() {
        let mut encoder = LabelEncoder::fit(&["R/B", "PAY", "DEB", "PAY"]);
        assert_eq!(encoder.classes(), ["DEB", "PAY", "R/B"]);
        assert_eq!(encoder.transform("PAY"), Some(1));
        assert_eq!(encoder.transform("UNK"), None);

        assert_eq!(encoder.encode_or_extend("UNK"), 3);
        assert_eq!(encoder.encode_or_extend("UNK"), 3);
        assert_eq!(encoder.transform("DEB"), Some(0));
    }

    #[test]
    fn test_status_mapping() {
        let mapping = StatusMapping::from_values(&["O", "R", "O", "D"]).unwrap();
        assert_eq!(mapping.encode("D").unwrap(), 2);
        assert_eq!(mapping.decode(1).unwrap(), StatusLabel::Reentered);
        assert!(matches!(mapping.encode("L"), Err(LearningError::UnmappedTarget(_))));
        assert!(mapping.decode(9).is_err());
        assert!(StatusMapping::from_values(&["O", "AR"]).is_err());
    }

    #[test]
    fn test_status_mapping_serde() {
        let mapping = StatusMapping::from_values(&["O", "ERR"]).unwrap();
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"labels":["O","ERR"]}"#);
    }

    // ========================================================================
    // Scaling and splitting
    // ========================================================================

    #[test]
    fn test_scaler() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.mean(), [2.0, 5.0]);
        assert_eq!(scaler.scale(), [1.0, 1.0]);

        let mut row = vec![3.0, 7.0];
        scaler.transform(&mut row).unwrap();
        assert_eq!(row, vec![1.0, 2.0]);
        assert!(scaler.transform(&mut [1.0]).is_err());
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(train_test_split(10, 0.2, 42).unwrap(), (train, test));
        assert_eq!(train_test_split(11, 0.2, 1).unwrap().1.len(), 3);
    }

    #[test]
    fn test_split_too_small() {
        assert!(train_test_split(1, 0.2, 42).is_err());
        assert!(train_test_split(0, 0.2, 42).is_err());
    }
}
