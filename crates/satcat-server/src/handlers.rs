//! Route handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use satcat_learning::{Prediction, PredictionRequest};
use satcat_processing::{AGGREGATE_NAMES, Cell, Table};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
    let predictor = state.predictor().ok_or(ApiError::ModelUnavailable)?;

    let prediction = predictor.predict_request(&request)?;
    debug!("Predicted {} for {:?}", prediction, request);
    Ok(Json(Prediction { prediction }))
}

pub async fn list_aggregates() -> Json<Vec<&'static str>> {
    Json(AGGREGATE_NAMES.to_vec())
}

pub async fn get_aggregate(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Map<String, Value>>>, ApiError> {
    if !AGGREGATE_NAMES.contains(&name.as_str()) {
        return Err(ApiError::UnknownAggregate(name));
    }

    let store = state.store().clone();
    let table = tokio::task::spawn_blocking(move || store.read_table(&name))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))??;
    Ok(Json(table_rows(&table)))
}

/// One JSON object per row, keyed by column name.
pub fn table_rows(table: &Table) -> Vec<Map<String, Value>> {
    (0..table.height())
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|column| (column.name.clone(), cell_value(&column.cells[row])))
                .collect()
        })
        .collect()
}

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Missing => Value::Null,
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => json!(*n as i64),
        Cell::Number(n) => json!(n),
        Cell::Text(_) | Cell::Date(_) => Value::String(cell.to_string()),
    }
}
