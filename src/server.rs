//! HTTP surface for the scoring service

use crate::error::PipelineError;
use crate::metrics::ScoringMetrics;
use crate::schema::SchemaDescriptor;
use crate::scoring::{HealthStatus, ScoringService};
use crate::types::{FeatureRecord, OneOrMany, Prediction};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Shared, read-only handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScoringService>,
    pub metrics: Arc<ScoringMetrics>,
}

/// Loaded model description
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub version: Option<String>,
    pub schema: SchemaDescriptor,
}

/// Error body returned to clients
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps pipeline errors onto HTTP statuses
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Create the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/model", get(model_info))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service.health())
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(ModelInfo {
        version: state.service.version().map(str::to_string),
        schema: state.service.schema().clone(),
    })
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<OneOrMany<FeatureRecord>>,
) -> Result<Json<OneOrMany<Prediction>>, ApiError> {
    let start = Instant::now();

    match state.service.score(request) {
        Ok(response) => {
            let predictions: &[Prediction] = match &response {
                OneOrMany::One(p) => std::slice::from_ref(p),
                OneOrMany::Many(ps) => ps,
            };
            let probabilities: Vec<f64> = predictions.iter().map(|p| p.probability).collect();
            let positives = predictions.iter().filter(|p| p.label == 1).count() as u64;
            let latency = start.elapsed();

            state.metrics.record_request(latency, &probabilities, positives);
            debug!(
                records = predictions.len(),
                latency_us = latency.as_micros() as u64,
                "Scoring request served"
            );
            Ok(Json(response))
        }
        Err(e) => {
            state.metrics.record_rejection();
            warn!(error = %e, "Scoring request rejected");
            Err(e.into())
        }
    }
}
