//! API error type and its HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use satcat_learning::LearningError;
use satcat_processing::ProcessingError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by the API handlers.
///
/// Rendered as `{"error": {"code": ..., "message": ...}}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Aggregate '{0}' does not exist")]
    UnknownAggregate(String),

    #[error("No model is loaded; train one and restart the server")]
    ModelUnavailable,

    #[error(transparent)]
    Learning(#[from] LearningError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::UnknownAggregate(_) => "AGGREGATE_NOT_FOUND",
            Self::ModelUnavailable => "MODEL_UNAVAILABLE",
            Self::Learning(e) => e.error_code(),
            Self::Processing(e) => e.error_code(),
            Self::Task(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownAggregate(_) => StatusCode::NOT_FOUND,
            Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Learning(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            Self::Processing(ProcessingError::ArtifactNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Learning(_) | Self::Processing(_) | Self::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} {}: {}", status.as_u16(), self.code(), self);
        }
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::UnknownAggregate("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LearningError::MissingFeature("span".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LearningError::ModelNotFitted("scaler".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(ProcessingError::ArtifactNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ApiError::ModelUnavailable.code(), "MODEL_UNAVAILABLE");
        assert_eq!(
            ApiError::from(LearningError::MissingFeature("span".into())).code(),
            "MISSING_FEATURE"
        );
    }
}
