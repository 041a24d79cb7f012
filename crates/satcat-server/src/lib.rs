//! HTTP API for the satellite catalog.
//!
//! Serves status predictions from the trained classifier and the aggregate
//! tables produced by the catalog build.
//!
//! | Method | Path               | Response                                |
//! |--------|--------------------|-----------------------------------------|
//! | GET    | `/healthz`         | `{"status": "ok"}`                      |
//! | POST   | `/predict`         | `{"prediction": "<status label>"}`      |
//! | GET    | `/aggregates`      | aggregate table names                   |
//! | GET    | `/aggregates/:name`| rows of one aggregate as JSON objects   |
//!
//! Errors are returned as `{"error": {"code": ..., "message": ...}}`.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use satcat_learning::Predictor;
use satcat_processing::ArtifactStore;

pub use error::ApiError;

/// Shared handler state.
///
/// The predictor is loaded once at startup; it is absent when no model has
/// been trained yet, in which case `/predict` answers 503.
#[derive(Clone)]
pub struct AppState {
    predictor: Option<Arc<Predictor>>,
    store: ArtifactStore,
}

impl AppState {
    pub fn new(store: ArtifactStore, predictor: Option<Predictor>) -> Self {
        Self {
            predictor: predictor.map(Arc::new),
            store,
        }
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.predictor.as_deref()
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/predict", post(handlers::predict))
        .route("/aggregates", get(handlers::list_aggregates))
        .route("/aggregates/:name", get(handlers::get_aggregate))
        .with_state(state)
}
