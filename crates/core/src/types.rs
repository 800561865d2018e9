//! Domain records shared across the pipeline services.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Ordered sequence of real-valued features of fixed dimension.
pub type FeatureVector = Vec<f64>;

// ── Matrix validation ─────────────────────────────────────────────

/// Validate a 2-D feature matrix: non-empty and rectangular.
///
/// Returns `(rows, cols)` on success.
pub fn validate_matrix(features: &[FeatureVector]) -> Result<(usize, usize), PipelineError> {
    if features.is_empty() {
        return Err(PipelineError::InvalidShape("features matrix has no rows".to_string()));
    }
    let cols = features[0].len();
    if cols == 0 {
        return Err(PipelineError::InvalidShape("feature rows are empty".to_string()));
    }
    for (i, row) in features.iter().enumerate() {
        if row.len() != cols {
            return Err(PipelineError::InvalidShape(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                cols
            )));
        }
    }
    Ok((features.len(), cols))
}

/// Validate that a label vector, when present, is parallel to the matrix.
pub fn validate_labels(rows: usize, labels: Option<&[i64]>) -> Result<(), PipelineError> {
    if let Some(labels) = labels {
        if labels.len() != rows {
            return Err(PipelineError::InvalidShape(format!(
                "{} labels for {} rows",
                labels.len(),
                rows
            )));
        }
    }
    Ok(())
}

// ── Queue payloads ────────────────────────────────────────────────

/// One ingested batch: the unit enqueued on `data_queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub features: Vec<FeatureVector>,
    pub labels: Option<Vec<i64>>,
    pub batch_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One streamed sample: the unit enqueued on `stream_queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSample {
    pub features: FeatureVector,
    pub label: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Served traffic snapshot appended to `prediction_buffer` per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServedRecord {
    pub features: Vec<FeatureVector>,
    pub predictions: Vec<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Retrain job descriptor enqueued on `retraining_queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainJob {
    pub trigger: TriggerReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_metrics: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl RetrainJob {
    pub fn manual() -> Self {
        Self {
            trigger: TriggerReason::Manual,
            drift_metrics: None,
            timestamp: Utc::now(),
        }
    }
}

// ── Enums ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    Manual,
    DriftDetected,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::DriftDetected => write!(f, "drift_detected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Started,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    None,
    RetrainingTriggered,
}

impl fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::RetrainingTriggered => write!(f, "retraining_triggered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Trained,
    Active,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trained => write!(f, "trained"),
            Self::Active => write!(f, "active"),
        }
    }
}

impl std::str::FromStr for TriggerReason {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "drift_detected" => Ok(Self::DriftDetected),
            other => Err(PipelineError::Other(format!("unknown trigger reason: {other}"))),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Other(format!("unknown job status: {other}"))),
        }
    }
}

impl std::str::FromStr for ActionTaken {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "retraining_triggered" => Ok(Self::RetrainingTriggered),
            other => Err(PipelineError::Other(format!("unknown action: {other}"))),
        }
    }
}

impl std::str::FromStr for ModelStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trained" => Ok(Self::Trained),
            "active" => Ok(Self::Active),
            other => Err(PipelineError::Other(format!("unknown model status: {other}"))),
        }
    }
}

// ── Persisted records ─────────────────────────────────────────────

/// One served prediction, as persisted in the `predictions` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    pub prediction: i64,
    /// Confidence of the predicted class (max of the probability row).
    pub probability: f64,
    pub true_label: Option<i64>,
    pub model_version: String,
    pub service_id: String,
}

/// One drift check outcome, as persisted in the `drift_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEventRecord {
    pub timestamp: DateTime<Utc>,
    pub drift_detected: bool,
    pub drift_score: f64,
    pub affected_features: Vec<String>,
    pub drift_metrics: serde_json::Value,
    pub action_taken: ActionTaken,
}

/// Metrics produced by one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub training_time: f64,
    pub samples_count: usize,
}

/// One retraining job, as persisted in the `training_jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJobRecord {
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    pub status: JobStatus,
    pub metrics: Option<TrainingMetrics>,
    pub model_version: Option<String>,
    pub trigger_reason: Option<TriggerReason>,
    pub tracking_run_id: Option<String>,
}

/// One scalar feature observation, as persisted in the `feature_store` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStoreRow {
    pub timestamp: DateTime<Utc>,
    pub feature_name: String,
    pub feature_value: f64,
    pub entity_id: String,
    pub feature_group: String,
}

/// One registered model, as persisted in the `model_registry` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegistryEntry {
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
    pub model_path: String,
    pub metrics: serde_json::Value,
    pub status: ModelStatus,
    pub deployed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_matrix_accepts_rectangular() {
        let m = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        assert_eq!(validate_matrix(&m).unwrap(), (3, 2));
    }

    #[test]
    fn validate_matrix_rejects_empty() {
        let m: Vec<FeatureVector> = Vec::new();
        assert!(matches!(validate_matrix(&m), Err(PipelineError::InvalidShape(_))));
    }

    #[test]
    fn validate_matrix_rejects_empty_rows() {
        let m = vec![Vec::new(), Vec::new()];
        assert!(matches!(validate_matrix(&m), Err(PipelineError::InvalidShape(_))));
    }

    #[test]
    fn validate_matrix_rejects_ragged_rows() {
        let m = vec![vec![1.0, 2.0], vec![3.0]];
        let err = validate_matrix(&m).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn validate_labels_rejects_length_mismatch() {
        assert!(validate_labels(3, Some(&[0, 1])).is_err());
        assert!(validate_labels(2, Some(&[0, 1])).is_ok());
        assert!(validate_labels(5, None).is_ok());
    }

    #[test]
    fn trigger_reason_serializes_snake_case() {
        let json = serde_json::to_string(&TriggerReason::DriftDetected).unwrap();
        assert_eq!(json, r#""drift_detected""#);
        let back: TriggerReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TriggerReason::DriftDetected);
        assert_eq!(TriggerReason::Manual.to_string(), "manual");
    }

    #[test]
    fn retrain_job_serde_roundtrip() {
        let job = RetrainJob {
            trigger: TriggerReason::DriftDetected,
            drift_metrics: Some(serde_json::json!({"drift_score": 0.5})),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&job).unwrap();
        let back: RetrainJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trigger, TriggerReason::DriftDetected);
        assert!(back.drift_metrics.is_some());
    }
}
