//! Prediction API handlers.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::model::{ModelError, PatientFeatures, PredictionLabel};
use crate::observability::metrics::EXPOSITION_CONTENT_TYPE;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub model_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: PredictionLabel,
    pub probability: f64,
    pub model_version: String,
}

/// Errors returned to API clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Model(ModelError::NotLoaded) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Model(ModelError::Inference(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Prediction failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let current = state.models.current();
    Json(HealthStatus {
        status: "healthy".to_string(),
        model_loaded: current.is_some(),
        model_version: current.map(|model| model.version().to_string()),
    })
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.metrics.render(),
    )
}

pub async fn predict(
    State(state): State<AppState>,
    Json(features): Json<PatientFeatures>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let (prediction, model) = state.models.predict(&features)?;
    state
        .metrics
        .record_prediction(prediction.label.as_str(), prediction.probability);

    tracing::debug!(
        label = %prediction.label,
        probability = prediction.probability,
        model_version = %model.version(),
        "Prediction served"
    );

    Ok(Json(PredictionResponse {
        prediction: prediction.label,
        probability: prediction.probability,
        model_version: model.version().to_string(),
    }))
}
