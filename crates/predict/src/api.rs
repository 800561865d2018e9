//! Prediction endpoints.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use driftflow_core::types::{validate_matrix, FeatureVector, PredictionRecord, ServedRecord};
use driftflow_core::PipelineError;
use driftflow_model::Model;

use crate::state::{ActiveModel, AppState};

pub const SERVICE_ID: &str = "prediction_service";

/// Default inference chunk for /predict/batch.
const DEFAULT_BATCH_SIZE: usize = 100;

// ── Error mapping ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

pub enum ApiError {
    Invalid(String),
    NoModel,
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::NoModel => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Invalid(msg) => msg.clone(),
            Self::NoModel => "no model available".to_string(),
            Self::Internal(msg) => msg.clone(),
        };
        (
            self.status_code(),
            Json(ErrorBody {
                status: "error",
                message,
            }),
        )
            .into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NoModel => Self::NoModel,
            PipelineError::InvalidShape(_) | PipelineError::DimensionMismatch { .. } => {
                Self::Invalid(e.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

// ── Requests / responses ──────────────────────────────────────────

/// `features` accepts a single row or a matrix; rows are promoted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeaturesInput {
    Matrix(Vec<Vec<f64>>),
    Row(Vec<f64>),
}

impl FeaturesInput {
    fn into_matrix(self) -> Vec<FeatureVector> {
        match self {
            Self::Matrix(m) => m,
            Self::Row(row) => vec![row],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: FeaturesInput,
}

#[derive(Debug, Deserialize)]
pub struct PredictBatchRequest {
    pub features: FeaturesInput,
    pub batch_size: Option<usize>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub status: &'static str,
    pub predictions: Vec<i64>,
    pub probabilities: Vec<Vec<f64>>,
    pub prediction_time: f64,
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_samples: Option<usize>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub model_loaded: bool,
    pub model_version: Option<String>,
    pub total_predictions: u64,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub model_version: String,
}

// ── Handlers ──────────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model = state.loaded_model().await;
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_ID,
        model_loaded: model.is_some(),
        model_version: model.map(|m| m.version.clone()),
        total_predictions: state.total_predictions.load(Ordering::Relaxed),
    })
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let matrix = req.features.into_matrix();
    serve(state, matrix, None, false).await
}

pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PredictBatchRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let matrix = req.features.into_matrix();
    let chunk = req.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
    serve(state, matrix, Some(chunk), true).await
}

/// The shared serving path. One model snapshot covers the entire call, so
/// every row in the response was produced by `model_version`.
async fn serve(
    state: Arc<AppState>,
    matrix: Vec<FeatureVector>,
    chunk_size: Option<usize>,
    report_total: bool,
) -> Result<Json<PredictResponse>, ApiError> {
    let (rows, cols) = validate_matrix(&matrix).map_err(ApiError::from)?;

    let handle = state.model_handle().await?;
    if cols != handle.model.n_features() {
        return Err(PipelineError::DimensionMismatch {
            expected: handle.model.n_features(),
            got: cols,
        }
        .into());
    }

    let start = Instant::now();
    let (predictions, probabilities) = infer(&handle, &matrix, chunk_size)?;
    let prediction_time = start.elapsed().as_secs_f64();

    state.total_predictions.fetch_add(rows as u64, Ordering::Relaxed);

    // Audit trail is the last step of the success path. A store outage is
    // log-only: the response stays authoritative.
    let timestamp = Utc::now();
    for (row, (&pred, probs)) in matrix.iter().zip(predictions.iter().zip(&probabilities)) {
        let confidence = probs.iter().copied().fold(0.0f64, f64::max);
        let record = PredictionRecord {
            timestamp,
            features: row.clone(),
            prediction: pred,
            probability: confidence,
            true_label: None,
            model_version: handle.version.clone(),
            service_id: SERVICE_ID.to_string(),
        };
        if let Err(e) = state.store.log_prediction(&record).await {
            tracing::warn!(error = %e, "failed to persist prediction record");
            break;
        }
    }

    if let Err(e) = state.bus.prediction_buffer.push(ServedRecord {
        features: matrix,
        predictions: predictions.clone(),
        timestamp,
    }) {
        tracing::warn!(error = %e, "prediction buffer full — drift sample dropped");
    }

    Ok(Json(PredictResponse {
        status: "success",
        predictions,
        probabilities,
        prediction_time,
        model_version: handle.version.clone(),
        total_samples: report_total.then_some(rows),
    }))
}

/// Run inference, optionally chunked to bound peak memory.
fn infer(
    handle: &ActiveModel,
    matrix: &[FeatureVector],
    chunk_size: Option<usize>,
) -> Result<(Vec<i64>, Vec<Vec<f64>>), ApiError> {
    match chunk_size {
        None => {
            let predictions = handle.model.predict(matrix)?;
            let probabilities = handle.model.predict_proba(matrix)?;
            Ok((predictions, probabilities))
        }
        Some(chunk) => {
            let mut predictions = Vec::with_capacity(matrix.len());
            let mut probabilities = Vec::with_capacity(matrix.len());
            for part in matrix.chunks(chunk) {
                predictions.extend(handle.model.predict(part)?);
                probabilities.extend(handle.model.predict_proba(part)?);
            }
            Ok((predictions, probabilities))
        }
    }
}

pub async fn reload_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, ApiError> {
    match state.reload_model().await? {
        Some(handle) => Ok(Json(ReloadResponse {
            status: "success",
            model_version: handle.version.clone(),
        })),
        None => Err(ApiError::Internal("failed to load model".to_string())),
    }
}
