//! End-to-end training and serving over an artifact directory.

use pretty_assertions::assert_eq;
use satcat_learning::{
    ClassWeight, ForestParams, LearningError, ParamGrid, PredictionRequest, Predictor,
    StatusMapping, Trainer, TrainingConfig, TrainingStage,
};
use satcat_processing::{ArtifactStore, COMBINED_DATASET, StatusLabel, Table};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const HEADERS: [&str; 9] = [
    "object_id",
    "total_mass",
    "span",
    "period_mins",
    "perigee_km",
    "apogee_km",
    "inclination",
    "object_type",
    "status",
];

/// Decayed rocket bodies in low orbits, live payloads higher up.
fn write_combined(store: &ArtifactStore, rows: usize) {
    let records: Vec<Vec<String>> = (0..rows)
        .map(|i| {
            let decayed = i % 2 == 0;
            let mass = if i % 7 == 0 { String::new() } else { format!("{}", 100 + i) };
            vec![
                format!("1960-{:03}A", i + 1),
                mass,
                "1.5".to_string(),
                if decayed { "88.5" } else { "98.7" }.to_string(),
                format!("{}", if decayed { 180 + i } else { 650 + i }),
                format!("{}", if decayed { 250 + i } else { 700 + i }),
                "51.6".to_string(),
                if decayed { "R/B" } else { "PAY" }.to_string(),
                if decayed { "R" } else { "O" }.to_string(),
            ]
        })
        .collect();
    let borrowed: Vec<Vec<&str>> = records
        .iter()
        .map(|r| r.iter().map(String::as_str).collect())
        .collect();
    let rows: Vec<&[&str]> = borrowed.iter().map(Vec::as_slice).collect();

    let table = Table::from_records(COMBINED_DATASET, &HEADERS, &rows);
    store.write_table(COMBINED_DATASET, &table).unwrap();
}

fn small_grid() -> ParamGrid {
    ParamGrid {
        n_estimators: vec![5],
        max_depth: vec![None, Some(3)],
        min_samples_split: vec![2],
        min_samples_leaf: vec![1],
        class_weight: vec![ClassWeight::Uniform, ClassWeight::Balanced],
    }
}

fn trained_store(rows: usize) -> (TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    write_combined(&store, rows);
    let config = TrainingConfig::builder()
        .param_grid(small_grid())
        .n_jobs(2)
        .build()
        .unwrap();
    Trainer::builder()
        .config(config)
        .build()
        .unwrap()
        .train_from_store(&store)
        .unwrap();
    (dir, store)
}

fn request(perigee: f64, object_type: &str) -> PredictionRequest {
    PredictionRequest {
        total_mass: 120.0,
        span: 1.5,
        period_mins: if perigee < 400.0 { 88.5 } else { 98.7 },
        perigee_km: perigee,
        apogee_km: perigee + 60.0,
        inclination: 51.6,
        object_type: object_type.to_string(),
    }
}

// =============================================================================
// Training
// =============================================================================

#[test]
fn test_train_from_store_writes_artifacts() {
    let (_dir, store) = trained_store(50);

    for name in [
        "ran_for_model",
        "scaler",
        "status_mapping",
        "object_type_label_encoder",
        "training_report",
    ] {
        assert!(store.has_json(name), "missing artifact {name}");
    }
    assert!(!store.has_json("total_mass_label_encoder"));

    let mapping: StatusMapping = store.read_json("status_mapping").unwrap();
    assert_eq!(mapping.labels(), [StatusLabel::Reentered, StatusLabel::InOrbit]);
}

#[test]
fn test_training_report() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    write_combined(&store, 50);

    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let config = TrainingConfig::builder()
        .param_grid(small_grid())
        .n_jobs(1)
        .build()
        .unwrap();
    let output = Trainer::builder()
        .config(config)
        .on_progress(move |update| sink.lock().unwrap().push(update))
        .build()
        .unwrap()
        .train_from_store(&store)
        .unwrap();

    let result = &output.result;
    assert_eq!(result.train_rows, 40);
    assert_eq!(result.test_rows, 10);
    assert_eq!(result.candidates.len(), 4);
    assert_eq!(result.metrics.accuracy, 1.0);
    assert_eq!(result.metrics.confusion_matrix.len(), 2);
    // every candidate separates the classes, so the first one wins
    assert_eq!(
        result.best_params,
        ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        }
    );

    let stages = stages.lock().unwrap();
    let searching: Vec<_> = stages
        .iter()
        .filter_map(|u| u.candidates_completed)
        .collect();
    assert_eq!(searching.len(), 4);
    assert_eq!(searching.last(), Some(&(4, 4)));
    assert!(stages.iter().any(|u| u.stage == TrainingStage::Persisting));
    assert_eq!(stages.last().map(|u| u.stage), Some(TrainingStage::Complete));
}

#[test]
fn test_train_without_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let err = Trainer::builder()
        .build()
        .unwrap()
        .train_from_store(&ArtifactStore::new(dir.path()))
        .unwrap_err();
    assert!(matches!(err, LearningError::Artifact(_)));
    assert_eq!(err.error_code(), "ARTIFACT_NOT_FOUND");
}

// =============================================================================
// Serving
// =============================================================================

#[test]
fn test_predictor_from_store() {
    let (_dir, store) = trained_store(50);
    let predictor = Predictor::load(&store).unwrap();

    assert_eq!(predictor.feature_names().len(), 7);
    assert_eq!(
        predictor.predict_request(&request(190.0, "R/B")).unwrap(),
        StatusLabel::Reentered
    );
    assert_eq!(
        predictor.predict_request(&request(690.0, "PAY")).unwrap(),
        StatusLabel::InOrbit
    );
}

#[test]
fn test_predictor_unseen_object_type() {
    let (_dir, store) = trained_store(50);
    let predictor = Predictor::load(&store).unwrap();

    predictor.predict_request(&request(690.0, "DEB")).unwrap();
    assert_eq!(
        predictor.encoder_classes("object_type").unwrap(),
        vec!["PAY", "R/B", "DEB"]
    );
}
