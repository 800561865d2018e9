//! Ingestion endpoints: batch and stream enqueue plus queue statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use driftflow_bus::BusError;
use driftflow_core::types::{validate_labels, validate_matrix, Batch, StreamSample};

use crate::state::AppState;

// ── Error mapping ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

pub enum ApiError {
    Invalid(String),
    QueueFull(&'static str),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Invalid(msg) => msg.clone(),
            Self::QueueFull(queue) => format!("queue '{queue}' is full, retry with backoff"),
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

impl From<BusError> for ApiError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::Full(queue) => Self::QueueFull(queue),
        }
    }
}

// ── Health & stats ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "ingestion_api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub status: &'static str,
    pub batch_queue_size: usize,
    pub stream_queue_size: usize,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        status: "success",
        batch_queue_size: state.bus.data_queue.len(),
        stream_queue_size: state.bus.stream_queue.len(),
    })
}

// ── Batch ingestion ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub features: Vec<Vec<f64>>,
    pub labels: Option<Vec<i64>>,
    pub batch_id: Option<String>,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub status: &'static str,
    pub samples_ingested: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let (rows, cols) = validate_matrix(&req.features).map_err(|e| ApiError::Invalid(e.to_string()))?;
    validate_labels(rows, req.labels.as_deref()).map_err(|e| ApiError::Invalid(e.to_string()))?;
    state.check_dimension(cols)?;

    // Single enqueue per batch: either the whole record lands or none of it.
    state.bus.data_queue.push(Batch {
        features: req.features,
        labels: req.labels,
        batch_id: req.batch_id.clone(),
        timestamp: Utc::now(),
    })?;

    tracing::info!(samples = rows, batch_id = req.batch_id.as_deref(), "batch ingested");
    Ok(Json(BatchResponse {
        status: "success",
        samples_ingested: rows,
        batch_id: req.batch_id,
    }))
}

// ── Stream ingestion ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub features: Vec<f64>,
    pub label: Option<i64>,
}

#[derive(Serialize)]
pub struct StreamResponse {
    pub status: &'static str,
}

pub async fn ingest_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StreamRequest>,
) -> Result<Json<StreamResponse>, ApiError> {
    if req.features.is_empty() {
        return Err(ApiError::Invalid("features must be a non-empty list".to_string()));
    }
    state.check_dimension(req.features.len())?;

    state.bus.stream_queue.push(StreamSample {
        features: req.features,
        label: req.label,
        timestamp: Utc::now(),
    })?;

    Ok(Json(StreamResponse { status: "success" }))
}

impl AppState {
    /// Pin the feature dimension on first ingestion; reject changes after.
    pub(crate) fn check_dimension(&self, cols: usize) -> Result<(), ApiError> {
        let current = self.expected_dim.load(Ordering::Acquire);
        if current == 0 {
            // First writer wins; a racing batch with another width is
            // caught by the comparison below on its own re-read.
            if self
                .expected_dim
                .compare_exchange(0, cols, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
        let fixed = self.expected_dim.load(Ordering::Acquire);
        if fixed != cols {
            return Err(ApiError::Invalid(format!(
                "rows have {cols} features, expected {fixed}"
            )));
        }
        Ok(())
    }
}
